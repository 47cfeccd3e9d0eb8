use super::*;

/// A nested value shape, like a record field holding another record.
enum Nest {
    Leaf(u32),
    Inner(Box<Nest>),
}

fn build(depth: u32) -> Nest {
    let mut n = Nest::Leaf(depth);
    for _ in 0..depth {
        n = Nest::Inner(Box::new(n));
    }
    n
}

fn depth_of(n: &Nest) -> u32 {
    ensure_sufficient_stack(|| match n {
        Nest::Leaf(_) => 0,
        Nest::Inner(inner) => depth_of(inner) + 1,
    })
}

fn leaf_of(n: &Nest) -> u32 {
    ensure_sufficient_stack(|| match n {
        Nest::Leaf(v) => *v,
        Nest::Inner(inner) => leaf_of(inner),
    })
}

#[test]
fn shallow_nesting() {
    let n = build(3);
    assert_eq!(depth_of(&n), 3);
    assert_eq!(leaf_of(&n), 3);
}

#[test]
fn deep_nesting_does_not_overflow() {
    let n = build(200_000);
    assert_eq!(depth_of(&n), 200_000);
    // Iterative drop: the derived drop glue would recurse.
    let mut cur = n;
    while let Nest::Inner(inner) = cur {
        cur = *inner;
    }
}

#[test]
fn passes_through_results() {
    let ok: Result<u8, &str> = ensure_sufficient_stack(|| Ok(7));
    assert_eq!(ok, Ok(7));
    let err: Result<u8, &str> = ensure_sufficient_stack(|| Err("boom"));
    assert_eq!(err, Err("boom"));
}
