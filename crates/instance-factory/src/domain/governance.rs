//! # Governance
//!
//! Two independent authorization scopes:
//!
//! | Scope | Type | Gates |
//! |-------|------|-------|
//! | Factory | [`AdminSet`] | `deploy_deterministic_clone`, `deploy_deterministic_upgradable_proxy` |
//! | Instance | [`InstanceAdmin`] | `upgradeTo`, `upgradeToAndCall` on one proxy |
//!
//! Both check the direct caller of the operation, never a delegated signer.

use crate::domain::value_objects::Address;
use crate::errors::{ExecutionError, FactoryError};
use std::collections::BTreeSet;

/// Immutable factory-level admin set.
///
/// An empty set is valid: the factory can be constructed, but every
/// deployment is rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminSet {
    members: BTreeSet<Address>,
}

impl AdminSet {
    /// Builds the set. Duplicate entries collapse.
    pub fn new(admins: impl IntoIterator<Item = Address>) -> Self {
        Self {
            members: admins.into_iter().collect(),
        }
    }

    /// Membership test.
    #[must_use]
    pub fn is_admin(&self, address: &Address) -> bool {
        self.members.contains(address)
    }

    /// Fails with [`FactoryError::Unauthorized`] unless `caller` is a member.
    pub fn ensure_admin(&self, caller: Address) -> Result<(), FactoryError> {
        if self.is_admin(&caller) {
            Ok(())
        } else {
            Err(FactoryError::Unauthorized { caller })
        }
    }

    /// Number of distinct admins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no one may deploy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.members.iter()
    }
}

/// The account allowed to retarget one specific proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceAdmin(Address);

impl InstanceAdmin {
    /// Wraps the stored admin address.
    #[must_use]
    pub const fn new(admin: Address) -> Self {
        Self(admin)
    }

    /// The admin address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.0
    }

    /// True if `caller` is this proxy's admin.
    #[must_use]
    pub fn is(&self, caller: &Address) -> bool {
        self.0 == *caller
    }

    /// Fails with [`ExecutionError::Unauthorized`] unless `caller` is the admin.
    pub fn ensure(&self, caller: Address) -> Result<(), ExecutionError> {
        if self.is(&caller) {
            Ok(())
        } else {
            Err(ExecutionError::Unauthorized { caller })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_set_membership() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);
        let set = AdminSet::new([a, a, b]);

        assert_eq!(set.len(), 2);
        assert!(set.is_admin(&a));
        assert!(set.ensure_admin(b).is_ok());
        assert_eq!(
            set.ensure_admin(Address::new([3u8; 20])),
            Err(FactoryError::Unauthorized {
                caller: Address::new([3u8; 20])
            })
        );
    }

    #[test]
    fn test_empty_admin_set_rejects_everyone() {
        let set = AdminSet::new(Vec::<Address>::new());
        assert!(set.is_empty());
        assert!(set.ensure_admin(Address::ZERO).is_err());
    }

    #[test]
    fn test_instance_admin_is_separate_scope() {
        let factory_admin = Address::new([1u8; 20]);
        let proxy_admin = InstanceAdmin::new(Address::new([2u8; 20]));

        assert!(proxy_admin.ensure(Address::new([2u8; 20])).is_ok());
        assert_eq!(
            proxy_admin.ensure(factory_admin),
            Err(ExecutionError::Unauthorized {
                caller: factory_admin
            })
        );
    }
}
