//! Tests for thunderbit-registry: indices, identity, concurrency

use std::sync::Arc;
use thunderbit_core::*;
use thunderbit_registry::{IndexStats, RuntimeRegistry};

fn bit(cat: CategoryId, owner: Option<&str>) -> Thunderbit {
    let mut b = Thunderbit::new(&Taxonomy::builtin().get(cat).unwrap());
    b.owner = owner.map(str::to_string);
    b
}

fn ids(bits: &[Arc<Thunderbit>]) -> Vec<BitId> {
    let mut out: Vec<BitId> = bits.iter().map(|b| b.id()).collect();
    out.sort();
    out
}

// ===========================================================================
// Register / lookup / unregister
// ===========================================================================

#[test]
fn register_then_lookup() {
    let reg = RuntimeRegistry::new();
    let b = bit(CategoryId::Cognitive, Some("ada"));
    let id = b.id();
    reg.register(b).unwrap();

    assert_eq!(reg.lookup(id).unwrap().id(), id);
    assert_eq!(reg.by_category(CategoryId::Cognitive).len(), 1);
    assert_eq!(reg.by_owner("ada").len(), 1);
    assert_eq!(reg.by_role(Role::Transformer).len(), 1);
    assert!(reg.by_owner("bob").is_empty());
    assert!(reg.by_category(CategoryId::Motor).is_empty());
}

#[test]
fn lookup_missing_is_not_found() {
    let reg = RuntimeRegistry::new();
    assert!(matches!(reg.lookup(BitId::new()), Err(Error::NotFound(_))));
}

#[test]
fn duplicate_register_keeps_first() {
    let reg = RuntimeRegistry::new();
    let b = bit(CategoryId::Sensory, Some("ada"));
    reg.register(b.clone()).unwrap();

    let mut dup = b.clone();
    dup.owner = Some("bob".into());
    assert!(matches!(reg.register(dup), Err(Error::AlreadyRegistered(id)) if id == b.id()));
    assert_eq!(reg.lookup(b.id()).unwrap().owner.as_deref(), Some("ada"));
    assert!(reg.by_owner("bob").is_empty());
}

#[test]
fn unregister_leaves_no_index_residue() {
    let reg = RuntimeRegistry::new();
    let a = bit(CategoryId::Social, Some("ada"));
    let b = bit(CategoryId::Social, Some("ada"));
    let (ida, idb) = (a.id(), b.id());
    reg.register(a).unwrap();
    reg.register(b).unwrap();

    reg.unregister(ida);
    assert_eq!(ids(&reg.by_owner("ada")), vec![idb]);
    reg.unregister(idb);

    assert_eq!(reg.count(), 0);
    assert_eq!(reg.index_stats(), IndexStats::default());
}

#[test]
fn unregister_is_idempotent() {
    let reg = RuntimeRegistry::new();
    let b = bit(CategoryId::Mnemonic, None);
    let id = b.id();
    reg.register(b).unwrap();
    assert!(reg.unregister(id).is_some());
    assert!(reg.unregister(id).is_none());
    assert!(reg.unregister(BitId::new()).is_none());
    assert!(reg.is_empty());
}

#[test]
fn clear_empties_every_index() {
    let reg = RuntimeRegistry::new();
    for cat in CategoryId::all() {
        reg.register(bit(*cat, Some("ada"))).unwrap();
    }
    assert_eq!(reg.count(), 8);
    assert_eq!(reg.index_stats().roles, 8);
    reg.clear();
    assert!(reg.is_empty());
    assert_eq!(reg.index_stats(), IndexStats::default());
}

// ===========================================================================
// Update
// ===========================================================================

#[test]
fn update_moves_owner_index() {
    let reg = RuntimeRegistry::new();
    let b = bit(CategoryId::Executive, Some("ada"));
    let id = b.id();
    reg.register(b).unwrap();

    let updated = reg
        .update(id, |b| {
            let mut next = b.clone();
            next.owner = Some("bob".into());
            next
        })
        .unwrap();
    assert_eq!(updated.owner.as_deref(), Some("bob"));
    assert!(reg.by_owner("ada").is_empty());
    assert_eq!(ids(&reg.by_owner("bob")), vec![id]);
    assert_eq!(reg.index_stats().owners, 1);

    reg.update(id, |b| {
        let mut next = b.clone();
        next.owner = None;
        next
    })
    .unwrap();
    assert_eq!(reg.index_stats().owners, 0);
}

#[test]
fn update_restores_identity_fields() {
    let reg = RuntimeRegistry::new();
    let b = bit(CategoryId::Perceptual, None);
    let id = b.id();
    reg.register(b.clone()).unwrap();
    let other = bit(CategoryId::Motor, None);

    let updated = reg
        .update(id, |_| {
            let mut swapped = other.clone();
            swapped.salience = 0.8;
            swapped
        })
        .unwrap();
    assert!(updated.same_identity(&b));
    assert_eq!(updated.salience, 0.8);
    assert_eq!(ids(&reg.by_category(CategoryId::Perceptual)), vec![id]);
    assert!(reg.by_category(CategoryId::Motor).is_empty());
}

#[test]
fn update_rejects_invalid_result_and_keeps_old() {
    let reg = RuntimeRegistry::new();
    let b = bit(CategoryId::Cognitive, None);
    let id = b.id();
    reg.register(b).unwrap();
    let res = reg.update(id, |b| {
        let mut next = b.clone();
        next.energy = 3.0;
        next
    });
    assert!(matches!(res, Err(Error::InvalidAttribute { .. })));
    assert_eq!(reg.lookup(id).unwrap().energy, 1.0);
}

#[test]
fn update_missing_is_not_found() {
    let reg = RuntimeRegistry::new();
    assert!(matches!(
        reg.update(BitId::new(), |b| b.clone()),
        Err(Error::NotFound(_))
    ));
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[test]
fn concurrent_disjoint_registration_keeps_indices_consistent() {
    let reg = RuntimeRegistry::new();
    let owners = ["ada", "bob", "cy", "dee"];

    std::thread::scope(|s| {
        for (t, owner) in owners.iter().enumerate() {
            let reg = &reg;
            s.spawn(move || {
                let mut mine = Vec::new();
                for i in 0..200 {
                    let cat = CategoryId::all()[(t + i) % CategoryId::all().len()];
                    let b = bit(cat, Some(*owner));
                    mine.push(b.id());
                    reg.register(b).unwrap();
                }
                // Drop every other bit again
                for id in mine.iter().step_by(2) {
                    assert!(reg.unregister(*id).is_some());
                }
            });
        }
    });

    assert_eq!(reg.count(), owners.len() * 100);
    for owner in owners {
        let bits = reg.by_owner(owner);
        assert_eq!(bits.len(), 100);
        assert!(bits.iter().all(|b| b.owner.as_deref() == Some(owner)));
    }
    let by_cat: usize = CategoryId::all().iter().map(|c| reg.by_category(*c).len()).sum();
    let by_role: usize = Role::all().iter().map(|r| reg.by_role(*r).len()).sum();
    assert_eq!(by_cat, reg.count());
    assert_eq!(by_role, reg.count());
}

#[test]
fn concurrent_same_id_register_admits_exactly_one() {
    let reg = RuntimeRegistry::new();
    let b = bit(CategoryId::Motor, Some("ada"));
    let id = b.id();

    let wins: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = &reg;
                let b = b.clone();
                s.spawn(move || reg.register(b).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum()
    });

    assert_eq!(wins, 1);
    assert_eq!(ids(&reg.by_owner("ada")), vec![id]);
    assert_eq!(reg.by_category(CategoryId::Motor).len(), 1);
}

#[test]
fn readers_never_see_unregistered_members() {
    let reg = RuntimeRegistry::new();

    std::thread::scope(|s| {
        let writer = &reg;
        s.spawn(move || {
            for _ in 0..500 {
                let b = bit(CategoryId::Ethical, Some("ada"));
                let id = b.id();
                writer.register(b).unwrap();
                writer
                    .update(id, |b| {
                        let mut next = b.clone();
                        next.owner = Some("bob".into());
                        next
                    })
                    .unwrap();
                writer.unregister(id);
            }
        });
        let reader = &reg;
        s.spawn(move || {
            for _ in 0..500 {
                for b in reader.by_owner("ada") {
                    assert_eq!(b.owner.as_deref(), Some("ada"));
                }
                for b in reader.by_role(Role::Critic) {
                    assert_eq!(b.category(), CategoryId::Ethical);
                }
            }
        });
    });

    assert!(reg.is_empty());
    assert_eq!(reg.index_stats(), IndexStats::default());
}
