//! Property tests for tolerance, matrix and path helpers used by the comparator.

use machfile_types::{Comparator, Instance, Matrix, NodePath, SchemaRegistry, Segment, Tolerance};
use proptest::prelude::*;

fn finite() -> impl Strategy<Value = f64> {
    -1e6f64..1e6
}

fn shaft() -> impl Strategy<Value = Instance> {
    (0.01f64..1.0, 0.001f64..0.2).prop_map(|(length, diameter)| {
        SchemaRegistry::builtin()
            .instantiate("Shaft")
            .unwrap()
            .with("Lshaft", length)
            .with("Drsh", diameter)
    })
}

proptest! {
    #[test]
    fn closeness_is_reflexive_and_symmetric(a in finite(), b in finite(), abs in 0.0f64..1.0, rel in 0.0f64..0.1) {
        let tol = Tolerance::new(abs, rel);
        prop_assert!(tol.close(a, a));
        prop_assert_eq!(tol.close(a, b), tol.close(b, a));
        prop_assert_eq!(Tolerance::EXACT.close(a, b), a == b);
    }

    #[test]
    fn comparator_is_reflexive_and_sees_edits(s in shaft(), delta in 1e-3f64..1.0) {
        let comparator = Comparator::builtin();
        prop_assert!(comparator.is_equal(&s, &s.clone()));

        let mut edited = s.clone();
        let length = s.f64("Lshaft").unwrap();
        edited.set("Lshaft", length + delta);
        let difference = comparator.first_difference(&s, &edited).unwrap();
        prop_assert_eq!(difference.path.as_str(), "Lshaft");
        prop_assert!(comparator.clone().ignore_field("Lshaft").is_equal(&s, &edited));
    }

    #[test]
    fn negation_is_an_involution(data in prop::collection::vec(finite(), 1..24)) {
        let m = Matrix::vector(data);
        prop_assert_eq!(m.negated().negated(), m);
    }

    #[test]
    fn paths_split_into_their_steps(
        fields in prop::collection::vec("[a-z_][a-z0-9_]{0,6}", 1..5),
        index in 0usize..50,
    ) {
        let mut path = NodePath::root();
        for field in &fields {
            path = path.field(field);
        }
        let path = path.index(index);
        let segments = path.segments().unwrap();
        prop_assert_eq!(segments.len(), fields.len() + 1);
        prop_assert_eq!(segments.last(), Some(&Segment::Index(index)));
        prop_assert_eq!(path.leaf_field(), fields.last().map(String::as_str));
    }
}
