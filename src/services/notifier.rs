// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-visible notices and the notification list.

use crate::models::{Notification, NotificationLevel};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Surface for short user-visible notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);

    fn success(&self, message: &str) {
        self.notify(NotificationLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// In-process notification list, newest first.
#[derive(Default)]
pub struct NotificationCenter {
    notifications: Mutex<Vec<Notification>>,
    next_id: AtomicU64,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a notification and return its id.
    pub fn add(&self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let notification = Notification {
            id,
            level,
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        };
        self.lock().insert(0, notification);
        id
    }

    /// Mark one notification read. Returns false if the id is unknown.
    pub fn mark_as_read(&self, id: u64) -> bool {
        match self.lock().iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_as_read(&self) {
        for notification in self.lock().iter_mut() {
            notification.read = true;
        }
    }

    /// Remove a notification. Returns false if the id is unknown.
    pub fn remove(&self, id: u64) -> bool {
        let mut notifications = self.lock();
        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        notifications.len() != before
    }

    pub fn unread_count(&self) -> usize {
        self.lock().iter().filter(|n| !n.read).count()
    }

    pub fn list(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Most recent notification, if any.
    pub fn latest(&self) -> Option<Notification> {
        self.lock().first().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Error => tracing::warn!(message, "Notice"),
            _ => tracing::info!(message, "Notice"),
        }
        self.add(level, message);
    }
}
