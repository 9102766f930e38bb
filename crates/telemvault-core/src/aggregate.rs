// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::ciphertext::{CipherArithmetic, CiphertextHandle};
use crate::error::{RegistryError, RegistryResult};
use std::collections::HashMap;
use telemvault_protocol::{equipment_hash, EquipmentHash};

/// Per-equipment running encrypted counts plus the reverse index that
/// turns a callback-carried equipment hash back into its id.
///
/// The index is append-only, entries unique, order = first-seen. The
/// reverse lookup is a direct hash->id map; the original's linear
/// scan had the same observable behavior with worse complexity.
#[derive(Debug, Default)]
pub struct EquipmentLedger {
    counts: HashMap<String, CiphertextHandle>,
    index: Vec<String>,
    by_hash: HashMap<EquipmentHash, String>,
}

impl EquipmentLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count_ciphertext(&self, equipment_id: &str) -> Option<&CiphertextHandle> {
        self.counts.get(equipment_id)
    }

    #[must_use]
    pub fn reverse(&self, hash: &EquipmentHash) -> Option<&str> {
        self.by_hash.get(hash).map(String::as_str)
    }

    /// First-seen order.
    #[must_use]
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Computes the incremented count for `equipment_id` without
    /// mutating anything; aggregates are lazily initialized from
    /// encrypted zero. Pair with [`Self::commit_increment`] once every
    /// other fallible step of the enclosing operation has passed.
    pub fn prepare_increment(
        &self,
        equipment_id: &str,
        cipher: &dyn CipherArithmetic,
    ) -> RegistryResult<CiphertextHandle> {
        let current = match self.counts.get(equipment_id) {
            Some(count) => count.clone(),
            None => cipher.encrypted_zero(),
        };
        cipher.add_one(&current)
    }

    /// Installs a prepared count. Appends the id to the index on
    /// first sight.
    pub fn commit_increment(&mut self, equipment_id: &str, new_count: CiphertextHandle) {
        if !self.counts.contains_key(equipment_id) {
            self.index.push(equipment_id.to_string());
            self.by_hash
                .insert(equipment_hash(equipment_id), equipment_id.to_string());
        }
        self.counts.insert(equipment_id.to_string(), new_count);
    }

    pub fn reverse_or_err(&self, hash: &EquipmentHash) -> RegistryResult<String> {
        self.reverse(hash)
            .map(str::to_string)
            .ok_or(RegistryError::EquipmentNotFound)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphertext::DevTallyCipher;

    #[test]
    fn aggregates_are_lazily_created() {
        let ledger = EquipmentLedger::new();
        assert!(ledger.count_ciphertext("EQ-1").is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn increment_initializes_from_encrypted_zero() {
        let cipher = DevTallyCipher;
        let mut ledger = EquipmentLedger::new();

        let one = ledger.prepare_increment("EQ-1", &cipher).unwrap();
        ledger.commit_increment("EQ-1", one);
        assert_eq!(
            DevTallyCipher::decode(ledger.count_ciphertext("EQ-1").unwrap()),
            Some(1)
        );

        let two = ledger.prepare_increment("EQ-1", &cipher).unwrap();
        ledger.commit_increment("EQ-1", two);
        assert_eq!(
            DevTallyCipher::decode(ledger.count_ciphertext("EQ-1").unwrap()),
            Some(2)
        );
    }

    #[test]
    fn prepare_does_not_mutate() {
        let cipher = DevTallyCipher;
        let mut ledger = EquipmentLedger::new();
        let _ = ledger.prepare_increment("EQ-1", &cipher).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.index().is_empty());

        let one = ledger.prepare_increment("EQ-1", &cipher).unwrap();
        ledger.commit_increment("EQ-1", one);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn index_is_first_seen_ordered_and_unique() {
        let cipher = DevTallyCipher;
        let mut ledger = EquipmentLedger::new();
        for id in ["EQ-2", "EQ-1", "EQ-2", "EQ-3", "EQ-1"] {
            let next = ledger.prepare_increment(id, &cipher).unwrap();
            ledger.commit_increment(id, next);
        }
        assert_eq!(ledger.index(), ["EQ-2", "EQ-1", "EQ-3"]);
    }

    #[test]
    fn reverse_lookup_roundtrips_through_the_equipment_hash() {
        let cipher = DevTallyCipher;
        let mut ledger = EquipmentLedger::new();
        let next = ledger.prepare_increment("EQ-7", &cipher).unwrap();
        ledger.commit_increment("EQ-7", next);

        let hash = equipment_hash("EQ-7");
        assert_eq!(ledger.reverse(&hash), Some("EQ-7"));
        assert_eq!(ledger.reverse_or_err(&hash).unwrap(), "EQ-7");

        let miss = equipment_hash("EQ-8");
        assert!(ledger.reverse(&miss).is_none());
        assert!(matches!(
            ledger.reverse_or_err(&miss),
            Err(RegistryError::EquipmentNotFound)
        ));
    }
}
