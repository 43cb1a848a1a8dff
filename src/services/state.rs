// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Observable state cell: snapshot, subscribe, update.

use tokio::sync::watch;

/// Holds a value and notifies subscribers on every change.
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current value.
    pub fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Receiver that sees the current value and every later change.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Modify the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub fn replace(&self, value: T) -> T {
        self.tx.send_replace(value)
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_updates() {
        let cell = StateCell::new(1u32);
        let mut rx = cell.subscribe();
        cell.update(|v| *v += 1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(cell.snapshot(), 2);
        assert_eq!(cell.replace(5), 2);
    }
}
