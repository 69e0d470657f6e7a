//! Composable boolean predicates.
//!
//! Any `Fn(&T) -> bool` is a [`Predicate`]; [`and`], [`or`] and [`not`]
//! combine predicates without a class hierarchy.

/// A yes/no test over values of `T`.
pub trait Predicate<T: ?Sized> {
    fn test(&self, value: &T) -> bool;
}

impl<T: ?Sized, F> Predicate<T> for F
where
    F: Fn(&T) -> bool,
{
    fn test(&self, value: &T) -> bool {
        self(value)
    }
}

/// Both predicates hold. Short-circuits on the left.
#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(A, B);

/// At least one predicate holds. Short-circuits on the left.
#[derive(Debug, Clone, Copy)]
pub struct Or<A, B>(A, B);

/// The inner predicate does not hold.
#[derive(Debug, Clone, Copy)]
pub struct Not<A>(A);

impl<T: ?Sized, A: Predicate<T>, B: Predicate<T>> Predicate<T> for And<A, B> {
    fn test(&self, value: &T) -> bool {
        self.0.test(value) && self.1.test(value)
    }
}

impl<T: ?Sized, A: Predicate<T>, B: Predicate<T>> Predicate<T> for Or<A, B> {
    fn test(&self, value: &T) -> bool {
        self.0.test(value) || self.1.test(value)
    }
}

impl<T: ?Sized, A: Predicate<T>> Predicate<T> for Not<A> {
    fn test(&self, value: &T) -> bool {
        !self.0.test(value)
    }
}

pub fn and<A, B>(left: A, right: B) -> And<A, B> {
    And(left, right)
}

pub fn or<A, B>(left: A, right: B) -> Or<A, B> {
    Or(left, right)
}

pub fn not<A>(inner: A) -> Not<A> {
    Not(inner)
}
