use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::AppConfig;
use crate::db::RecordStore;
use crate::services::ai::NaturalLanguageFieldExtractor;
use crate::services::booking::BookingLedger;
use crate::services::directory::PatientDirectory;
use crate::services::messaging::NotificationSender;
use crate::services::session::SessionStore;
use crate::services::slots::SlotMatcher;

/// Shared by every handler. Guards are taken for short synchronous sections
/// only and never held across an `.await`.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn RecordStore>,
    pub extractor: Option<Box<dyn NaturalLanguageFieldExtractor>>,
    pub notifier: Arc<dyn NotificationSender>,
    directory: Mutex<PatientDirectory>,
    schedule: Mutex<SlotMatcher>,
    ledger: Mutex<BookingLedger>,
    sessions: Mutex<SessionStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        extractor: Option<Box<dyn NaturalLanguageFieldExtractor>>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            directory: Mutex::new(PatientDirectory::load(store.clone())),
            schedule: Mutex::new(SlotMatcher::load(store.clone())),
            ledger: Mutex::new(BookingLedger::default()),
            sessions: Mutex::new(SessionStore::default()),
            config,
            store,
            extractor,
            notifier,
        }
    }

    pub fn directory(&self) -> MutexGuard<'_, PatientDirectory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn schedule(&self) -> MutexGuard<'_, SlotMatcher> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ledger(&self) -> MutexGuard<'_, BookingLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sessions(&self) -> MutexGuard<'_, SessionStore> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
