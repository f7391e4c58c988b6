//! Joined row shapes
//!
//! A joined row is a tuple with one optional entity per participating lane.
//! Lane 0 is the root entity of the query; `None` in any lane is an outer join
//! miss.

use crate::error::MaterializeError;
use crate::mapping::shared;
use crate::materialize::builder::RelationshipInstanceBuilder;
use crate::materialize::identity::InstanceIdentity;

/// A row of freshly materialized entities, one per lane
pub trait JoinedRow: Sized {
    /// The entity type of lane 0
    type Root: 'static;

    /// Number of entity lanes in the row
    const LANES: usize;

    /// Register every lane with `builder`, in tuple order, and return the root identity
    ///
    /// The caller still has to end the row.
    fn register(
        self,
        builder: &mut RelationshipInstanceBuilder,
    ) -> Result<InstanceIdentity<Self::Root>, MaterializeError>;
}

macro_rules! impl_joined_row {
    ($lanes:expr; $root:ident $(, $lane:ident)*) => {
        impl<$root: 'static $(, $lane: 'static)*> JoinedRow for (Option<$root>, $(Option<$lane>,)*) {
            type Root = $root;
            const LANES: usize = $lanes;

            #[allow(non_snake_case)]
            fn register(
                self,
                builder: &mut RelationshipInstanceBuilder,
            ) -> Result<InstanceIdentity<Self::Root>, MaterializeError> {
                let ($root, $($lane,)*) = self;
                let root = builder.register($root.map(shared))?;
                $(builder.register($lane.map(shared))?;)*
                Ok(root)
            }
        }
    };
}

impl_joined_row!(1; A);
impl_joined_row!(2; A, B);
impl_joined_row!(3; A, B, C);
impl_joined_row!(4; A, B, C, D);
impl_joined_row!(5; A, B, C, D, E);
impl_joined_row!(6; A, B, C, D, E, F);
impl_joined_row!(7; A, B, C, D, E, F, G);
impl_joined_row!(8; A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EntityMapping, Shared};

    #[derive(Debug, Default)]
    struct Employee {
        id: i32,
        workstation: Option<Shared<Workstation>>,
    }

    #[derive(Debug, Default)]
    struct Workstation {
        id: i32,
    }

    fn builder() -> RelationshipInstanceBuilder {
        let employees = EntityMapping::builder::<Employee>("employees")
            .key(|e: &Employee| vec![e.id.into()])
            .has_one(|e: &mut Employee| &mut e.workstation)
            .build()
            .unwrap();
        let workstations = EntityMapping::builder::<Workstation>("workstations")
            .key(|w: &Workstation| vec![w.id.into()])
            .build()
            .unwrap();
        RelationshipInstanceBuilder::new([employees, workstations])
    }

    #[test]
    fn test_lanes() {
        assert_eq!(<(Option<Employee>,) as JoinedRow>::LANES, 1);
        assert_eq!(<(Option<Employee>, Option<Workstation>) as JoinedRow>::LANES, 2);
        assert_eq!(
            <(
                Option<Employee>,
                Option<Workstation>,
                Option<Employee>,
                Option<Workstation>,
                Option<Employee>,
                Option<Workstation>,
                Option<Employee>,
                Option<Workstation>,
            ) as JoinedRow>::LANES,
            8
        );
    }

    #[test]
    fn test_register_tuple_returns_root() {
        let mut builder = builder();
        let row = (
            Some(Employee {
                id: 5,
                ..Default::default()
            }),
            Some(Workstation { id: 7 }),
        );
        let root = row.register(&mut builder).unwrap();
        builder.end_row().unwrap();

        let employee = root.unique_instance().unwrap().borrow();
        assert_eq!(employee.id, 5);
        assert_eq!(employee.workstation.as_ref().unwrap().borrow().id, 7);
    }

    #[test]
    fn test_register_tuple_with_absent_lane() {
        let mut builder = builder();
        let row: (Option<Employee>, Option<Workstation>) = (
            Some(Employee {
                id: 5,
                ..Default::default()
            }),
            None,
        );
        let root = row.register(&mut builder).unwrap();
        builder.end_row().unwrap();

        assert!(root.unique_instance().unwrap().borrow().workstation.is_none());
    }

    #[test]
    fn test_register_short_tuple_leaves_row_open() {
        let mut builder = builder();
        let row = (Some(Employee::default()),);
        row.register(&mut builder).unwrap();
        assert_eq!(builder.registered_in_row(), 1);
        assert!(builder.end_row().is_err());
    }
}
