//! Scripted stand-ins for the chat client and the lookups.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::llm::{ChatClient, ChatMessage, LlmError};
use crate::lookup::{DoctorId, DoctorLookup, DoctorRow, LookupError, SpecialistLookup};

pub(crate) struct ScriptedChat {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub(crate) fn replying(replies: &[&str]) -> Self {
        Self::with(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub(crate) fn failing() -> Self {
        Self::with(VecDeque::new())
    }

    pub(crate) fn with(responses: VecDeque<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChatClient for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::ApiKeyNotSet("OPENAI_API_KEY")))
    }
}

/// Answers every lookup with the same rows, or with an error when `rows` is `None`.
pub(crate) struct FakeSpecialists {
    rows: Option<Vec<String>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl FakeSpecialists {
    pub(crate) fn returning(rows: &[&str]) -> Self {
        Self {
            rows: Some(rows.iter().map(|r| r.to_string()).collect()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            rows: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }
}

impl SpecialistLookup for FakeSpecialists {
    async fn specialists_for(&self, symptoms: &[String]) -> Result<Vec<String>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(symptoms.to_vec());
        self.rows
            .clone()
            .ok_or_else(|| LookupError::Malformed("connection refused".into()))
    }
}

pub(crate) struct FakeDoctors {
    rows: Option<Vec<DoctorRow>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl FakeDoctors {
    pub(crate) fn returning(rows: Vec<DoctorRow>) -> Self {
        Self {
            rows: Some(rows),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            rows: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }
}

impl DoctorLookup for FakeDoctors {
    async fn doctors_for(&self, specialists: &[String]) -> Result<Vec<DoctorRow>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(specialists.to_vec());
        self.rows
            .clone()
            .ok_or_else(|| LookupError::Malformed("connection refused".into()))
    }
}

pub(crate) fn doctor_row(id: i64, name: &str, specialization: &str) -> DoctorRow {
    DoctorRow {
        doctor_id: DoctorId::Int(id),
        name: name.to_string(),
        specialization: specialization.to_string(),
        rating: Some(4.5),
        fees: Some(500),
        hospital: Some("General Hospital".to_string()),
        next_available_date: Some("2025-03-14".to_string()),
        start_time: Some("09:00:00".to_string()),
        end_time: Some("09:30:00".to_string()),
        slot_id: Some(id * 10),
    }
}
