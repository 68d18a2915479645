//! The `KindFlags` bit-set.
//!
//! Each type in the universe ends up with one `KindFlags` value describing
//! its structural role. The empty set means the type plays no role in
//! resolution. Definer/SuperDefiner are not flags; they are suppression
//! levels (see `suppression`).

use autowire_common::MarkerRole;
use bitflags::bitflags;

bitflags! {
    /// Structural role flags assigned to one type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KindFlags: u16 {
        /// Unique, directly-materialized gateway instance.
        const REAL_OBJECT = 1 << 0;
        /// Dependency-injected service.
        const AUTO_SERVICE = 1 << 1;
        /// Scoped service lifetime (implies AUTO_SERVICE).
        const SCOPED = 1 << 2;
        /// Singleton service lifetime (implies AUTO_SERVICE).
        const SINGLETON = 1 << 3;
        /// Interface implementable by several services at once.
        const MULTIPLE = 1 << 4;
        /// Pure data type.
        const POCO = 1 << 5;
        /// Data type closed to further property extension (implies POCO).
        const CLOSED_POCO = 1 << 6;
    }
}

impl Default for KindFlags {
    fn default() -> Self {
        KindFlags::empty()
    }
}

impl KindFlags {
    /// True when the type plays no role at all.
    pub fn is_none(self) -> bool {
        self.is_empty()
    }

    /// Human-readable flag list for diagnostics, e.g. `RealObject|Scoped`.
    pub fn describe(self) -> String {
        if self.is_empty() {
            return "None".to_string();
        }
        let mut parts = Vec::new();
        for (flag, name) in [
            (KindFlags::REAL_OBJECT, "RealObject"),
            (KindFlags::AUTO_SERVICE, "AutoService"),
            (KindFlags::SCOPED, "Scoped"),
            (KindFlags::SINGLETON, "Singleton"),
            (KindFlags::MULTIPLE, "Multiple"),
            (KindFlags::POCO, "Poco"),
            (KindFlags::CLOSED_POCO, "ClosedPoco"),
        ] {
            if self.contains(flag) {
                parts.push(name);
            }
        }
        parts.join("|")
    }
}

/// Maps a marker role to the flags it confers.
///
/// Lifetime markers fold in `AUTO_SERVICE` and `ClosedPoco` folds in `POCO`
/// here, so every later union keeps the implication invariants local to this
/// one function. Definer markers confer no flags; they only set a
/// suppression level.
pub fn role_flags(role: MarkerRole) -> KindFlags {
    match role {
        MarkerRole::RealObject => KindFlags::REAL_OBJECT,
        MarkerRole::AutoService => KindFlags::AUTO_SERVICE,
        MarkerRole::ScopedService => KindFlags::AUTO_SERVICE | KindFlags::SCOPED,
        MarkerRole::SingletonService => KindFlags::AUTO_SERVICE | KindFlags::SINGLETON,
        MarkerRole::Multiple => KindFlags::MULTIPLE,
        MarkerRole::Poco => KindFlags::POCO,
        MarkerRole::ClosedPoco => KindFlags::POCO | KindFlags::CLOSED_POCO,
        MarkerRole::Definer | MarkerRole::SuperDefiner => KindFlags::empty(),
    }
}
