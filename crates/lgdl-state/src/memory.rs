//! In-process state store: one lock per conversation so unrelated
//! conversations never contend, and turn numbering within one
//! conversation is always strictly increasing. All mutation here is
//! synchronous in-memory work, so a plain `std::sync::Mutex` is enough -
//! nothing ever awaits while holding it.

use crate::error::StateError;
use crate::model::{
    Conversation, ConversationStatus, ExtractedContext, NewTurn, PendingState, SlotValue, Turn,
};
use crate::store::StateStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

struct ConversationRecord {
    conversation: Conversation,
    turns: Vec<Turn>,
    slots: HashMap<String, SlotValue>,
    context: Vec<ExtractedContext>,
}

pub struct InMemoryStateStore {
    conversations: RwLock<HashMap<Uuid, Mutex<ConversationRecord>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    fn with_record<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ConversationRecord) -> T,
    ) -> Result<T, StateError> {
        let conversations = self.conversations.read().unwrap();
        let slot = conversations.get(&id).ok_or(StateError::NotFound(id))?;
        Ok(f(&mut slot.lock().unwrap()))
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_or_create_conversation(
        &self,
        id: Uuid,
        game_id: &str,
    ) -> Result<Conversation, StateError> {
        if let Ok(existing) = self.with_record(id, |r| r.conversation.clone()) {
            return Ok(existing);
        }

        let mut conversations = self.conversations.write().unwrap();
        if let Some(slot) = conversations.get(&id) {
            return Ok(slot.lock().unwrap().conversation.clone());
        }

        let now = Utc::now();
        let conversation = Conversation {
            id,
            game_id: game_id.to_string(),
            status: ConversationStatus::Active,
            current_move_state: None,
            awaiting_response: false,
            last_question: None,
            awaiting_slot_for_move: None,
            awaiting_slot_name: None,
            metadata: Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        };
        conversations.insert(
            id,
            Mutex::new(ConversationRecord {
                conversation: conversation.clone(),
                turns: Vec::new(),
                slots: HashMap::new(),
                context: Vec::new(),
            }),
        );
        Ok(conversation)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StateError> {
        match self.with_record(id, |r| r.conversation.clone()) {
            Ok(c) => Ok(Some(c)),
            Err(StateError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_turn(&self, conversation_id: Uuid, turn: NewTurn) -> Result<Turn, StateError> {
        self.with_record(conversation_id, move |record| {
            let turn_num = record.turns.len() as i64 + 1;
            let saved = Turn {
                conversation_id,
                turn_num,
                user_input: turn.user_input,
                sanitized_input: turn.sanitized_input,
                matched_move: turn.matched_move,
                confidence: turn.confidence,
                response: turn.response,
                extracted_params: turn.extracted_params,
                outcome: turn.outcome,
                created_at: Utc::now(),
            };
            record.turns.push(saved.clone());
            record.conversation.updated_at = saved.created_at;
            saved
        })
    }

    async fn list_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, StateError> {
        self.with_record(conversation_id, |r| r.turns.clone())
    }

    async fn upsert_slot(
        &self,
        conversation_id: Uuid,
        slot_name: &str,
        value: Value,
    ) -> Result<(), StateError> {
        self.with_record(conversation_id, move |record| {
            record.slots.insert(
                slot_name.to_string(),
                SlotValue {
                    slot_name: slot_name.to_string(),
                    value,
                    filled_at: Utc::now(),
                },
            );
        })
    }

    async fn get_slots(
        &self,
        conversation_id: Uuid,
    ) -> Result<HashMap<String, SlotValue>, StateError> {
        self.with_record(conversation_id, |r| r.slots.clone())
    }

    async fn clear_slots(&self, conversation_id: Uuid) -> Result<(), StateError> {
        self.with_record(conversation_id, |r| r.slots.clear())
    }

    async fn record_context(
        &self,
        conversation_id: Uuid,
        key: &str,
        value: Value,
        source: &str,
    ) -> Result<(), StateError> {
        self.with_record(conversation_id, move |record| {
            record.context.push(ExtractedContext {
                key: key.to_string(),
                value,
                source: source.to_string(),
                recorded_at: Utc::now(),
            });
        })
    }

    async fn get_context(&self, conversation_id: Uuid) -> Result<Vec<ExtractedContext>, StateError> {
        self.with_record(conversation_id, |r| r.context.clone())
    }

    async fn set_status(
        &self,
        conversation_id: Uuid,
        status: ConversationStatus,
    ) -> Result<(), StateError> {
        self.with_record(conversation_id, move |record| {
            record.conversation.status = status;
            record.conversation.updated_at = Utc::now();
        })
    }

    async fn set_pending_state(
        &self,
        conversation_id: Uuid,
        state: PendingState,
    ) -> Result<(), StateError> {
        self.with_record(conversation_id, move |record| {
            record.conversation.current_move_state = state.current_move_state;
            record.conversation.awaiting_response = state.awaiting_response;
            record.conversation.last_question = state.last_question;
            record.conversation.awaiting_slot_for_move = state.awaiting_slot_for_move;
            record.conversation.awaiting_slot_name = state.awaiting_slot_name;
            record.conversation.updated_at = Utc::now();
        })
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<(), StateError> {
        self.conversations.write().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TurnOutcome;

    fn sample_turn(utterance: &str) -> NewTurn {
        NewTurn {
            user_input: utterance.to_string(),
            sanitized_input: utterance.to_string(),
            matched_move: None,
            confidence: None,
            response: None,
            extracted_params: Value::Object(Default::default()),
            outcome: TurnOutcome::Unknown,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = InMemoryStateStore::new();
        let id = Uuid::new_v4();
        let a = store.get_or_create_conversation(id, "demo").await.unwrap();
        let b = store.get_or_create_conversation(id, "demo").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.created_at, b.created_at);
    }

    #[tokio::test]
    async fn turn_numbers_strictly_increase() {
        let store = InMemoryStateStore::new();
        let id = Uuid::new_v4();
        store.get_or_create_conversation(id, "demo").await.unwrap();
        let t1 = store.save_turn(id, sample_turn("hi")).await.unwrap();
        let t2 = store.save_turn(id, sample_turn("again")).await.unwrap();
        assert_eq!(t1.turn_num, 1);
        assert_eq!(t2.turn_num, 2);
    }

    #[tokio::test]
    async fn clear_slots_removes_everything() {
        let store = InMemoryStateStore::new();
        let id = Uuid::new_v4();
        store.get_or_create_conversation(id, "demo").await.unwrap();
        store
            .upsert_slot(id, "doctor", Value::String("Smith".into()))
            .await
            .unwrap();
        store.clear_slots(id).await.unwrap();
        assert!(store.get_slots(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let store = InMemoryStateStore::new();
        let err = store.get_slots(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[tokio::test]
    async fn pending_state_round_trips() {
        let store = InMemoryStateStore::new();
        let id = Uuid::new_v4();
        store.get_or_create_conversation(id, "demo").await.unwrap();
        store
            .set_pending_state(
                id,
                PendingState {
                    current_move_state: Some("book_appointment".to_string()),
                    awaiting_response: true,
                    last_question: Some("Which doctor?".to_string()),
                    awaiting_slot_for_move: Some("book_appointment".to_string()),
                    awaiting_slot_name: Some("doctor".to_string()),
                },
            )
            .await
            .unwrap();
        let conv = store.get_conversation(id).await.unwrap().unwrap();
        assert!(conv.awaiting_response);
        assert_eq!(conv.awaiting_slot_name.as_deref(), Some("doctor"));
    }
}
