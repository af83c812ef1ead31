/// A 64-bit edge or scalar-product weight. Zero is a valid weight.
///
/// All arithmetic goes through the `checked_*` helpers below; nothing in
/// this crate or `wsm_solver` ever adds or multiplies two `Weight`s with
/// plain `+`/`*`. A `None` from one of these is the single overflow
/// detection point the rest of the solver relies on (see the "Overflow
/// discipline" design note: reducers and the weight calculator treat `None`
/// as a local `NoGood`, and only `solve`'s entry point turns a `None` into
/// the public `Overflow` error).
pub type Weight = u64;

/// Checked `a + b`.
pub fn checked_add(a: Weight, b: Weight) -> Option<Weight> {
    a.checked_add(b)
}

/// Checked `a * b`.
pub fn checked_mul(a: Weight, b: Weight) -> Option<Weight> {
    a.checked_mul(b)
}

/// Checked `a + (b * c)`, the shape every scalar-product update needs.
pub fn checked_mul_add(a: Weight, b: Weight, c: Weight) -> Option<Weight> {
    checked_mul(b, c).and_then(|bc| checked_add(a, bc))
}
