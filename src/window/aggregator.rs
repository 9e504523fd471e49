//! `Aggregator<N>` (spec §4.4): bundles `N` independently-extracted,
//! independently-aggregated columns into one result tuple. Rust has no
//! variadic generics, so — matching the per-arity pattern already used for
//! [`crate::element::tuple`] — arities 1 through 4 are written out by hand.

use crate::element::tuple::{Tuple1, Tuple2, Tuple3, Tuple4};
use crate::element::WireAttribute;
use crate::error::PipeError;
use crate::window::aggregate::Aggregate;

/// Shorthand for "can be stored in one of the generated `TupleN`s".
trait Column: Clone + Send + Sync + WireAttribute + 'static {}
impl<T: Clone + Send + Sync + WireAttribute + 'static> Column for T {}

pub struct Aggregator1<In, A1: Aggregate> {
    extract1: Box<dyn Fn(&In) -> A1::In + Send>,
    a1: A1,
}

impl<In, A1: Aggregate> Aggregator1<In, A1>
where
    A1::Out: Column,
{
    pub fn new(extract1: impl Fn(&In) -> A1::In + Send + 'static) -> Self {
        Self {
            extract1: Box::new(extract1),
            a1: A1::init(),
        }
    }

    pub fn iterate(&mut self, input: &In, outdated: bool) -> Result<(), PipeError> {
        let v1 = (self.extract1)(input);
        self.a1.iterate(&v1, outdated)
    }

    pub fn value(&self) -> Tuple1<A1::Out> {
        Tuple1::new(self.a1.value())
    }
}

pub struct Aggregator2<In, A1: Aggregate, A2: Aggregate> {
    extract1: Box<dyn Fn(&In) -> A1::In + Send>,
    extract2: Box<dyn Fn(&In) -> A2::In + Send>,
    a1: A1,
    a2: A2,
}

impl<In, A1: Aggregate, A2: Aggregate> Aggregator2<In, A1, A2>
where
    A1::Out: Column,
    A2::Out: Column,
{
    pub fn new(
        extract1: impl Fn(&In) -> A1::In + Send + 'static,
        extract2: impl Fn(&In) -> A2::In + Send + 'static,
    ) -> Self {
        Self {
            extract1: Box::new(extract1),
            extract2: Box::new(extract2),
            a1: A1::init(),
            a2: A2::init(),
        }
    }

    pub fn iterate(&mut self, input: &In, outdated: bool) -> Result<(), PipeError> {
        let v1 = (self.extract1)(input);
        let v2 = (self.extract2)(input);
        self.a1.iterate(&v1, outdated)?;
        self.a2.iterate(&v2, outdated)
    }

    pub fn value(&self) -> Tuple2<A1::Out, A2::Out> {
        Tuple2::new(self.a1.value(), self.a2.value())
    }
}

pub struct Aggregator3<In, A1: Aggregate, A2: Aggregate, A3: Aggregate> {
    extract1: Box<dyn Fn(&In) -> A1::In + Send>,
    extract2: Box<dyn Fn(&In) -> A2::In + Send>,
    extract3: Box<dyn Fn(&In) -> A3::In + Send>,
    a1: A1,
    a2: A2,
    a3: A3,
}

impl<In, A1: Aggregate, A2: Aggregate, A3: Aggregate> Aggregator3<In, A1, A2, A3>
where
    A1::Out: Column,
    A2::Out: Column,
    A3::Out: Column,
{
    pub fn new(
        extract1: impl Fn(&In) -> A1::In + Send + 'static,
        extract2: impl Fn(&In) -> A2::In + Send + 'static,
        extract3: impl Fn(&In) -> A3::In + Send + 'static,
    ) -> Self {
        Self {
            extract1: Box::new(extract1),
            extract2: Box::new(extract2),
            extract3: Box::new(extract3),
            a1: A1::init(),
            a2: A2::init(),
            a3: A3::init(),
        }
    }

    pub fn iterate(&mut self, input: &In, outdated: bool) -> Result<(), PipeError> {
        let v1 = (self.extract1)(input);
        let v2 = (self.extract2)(input);
        let v3 = (self.extract3)(input);
        self.a1.iterate(&v1, outdated)?;
        self.a2.iterate(&v2, outdated)?;
        self.a3.iterate(&v3, outdated)
    }

    pub fn value(&self) -> Tuple3<A1::Out, A2::Out, A3::Out> {
        Tuple3::new(self.a1.value(), self.a2.value(), self.a3.value())
    }
}

pub struct Aggregator4<In, A1: Aggregate, A2: Aggregate, A3: Aggregate, A4: Aggregate> {
    extract1: Box<dyn Fn(&In) -> A1::In + Send>,
    extract2: Box<dyn Fn(&In) -> A2::In + Send>,
    extract3: Box<dyn Fn(&In) -> A3::In + Send>,
    extract4: Box<dyn Fn(&In) -> A4::In + Send>,
    a1: A1,
    a2: A2,
    a3: A3,
    a4: A4,
}

impl<In, A1: Aggregate, A2: Aggregate, A3: Aggregate, A4: Aggregate>
    Aggregator4<In, A1, A2, A3, A4>
where
    A1::Out: Column,
    A2::Out: Column,
    A3::Out: Column,
    A4::Out: Column,
{
    pub fn new(
        extract1: impl Fn(&In) -> A1::In + Send + 'static,
        extract2: impl Fn(&In) -> A2::In + Send + 'static,
        extract3: impl Fn(&In) -> A3::In + Send + 'static,
        extract4: impl Fn(&In) -> A4::In + Send + 'static,
    ) -> Self {
        Self {
            extract1: Box::new(extract1),
            extract2: Box::new(extract2),
            extract3: Box::new(extract3),
            extract4: Box::new(extract4),
            a1: A1::init(),
            a2: A2::init(),
            a3: A3::init(),
            a4: A4::init(),
        }
    }

    pub fn iterate(&mut self, input: &In, outdated: bool) -> Result<(), PipeError> {
        let v1 = (self.extract1)(input);
        let v2 = (self.extract2)(input);
        let v3 = (self.extract3)(input);
        let v4 = (self.extract4)(input);
        self.a1.iterate(&v1, outdated)?;
        self.a2.iterate(&v2, outdated)?;
        self.a3.iterate(&v3, outdated)?;
        self.a4.iterate(&v4, outdated)
    }

    pub fn value(&self) -> Tuple4<A1::Out, A2::Out, A3::Out, A4::Out> {
        Tuple4::new(self.a1.value(), self.a2.value(), self.a3.value(), self.a4.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::aggregate::{Avg, Count, SumI64};

    #[test]
    fn bundles_two_columns() {
        let mut agg: Aggregator2<(i64, f64), SumI64, Avg> =
            Aggregator2::new(|t| t.0, |t| t.1);
        agg.iterate(&(10, 1.0), false).unwrap();
        agg.iterate(&(20, 3.0), false).unwrap();
        let v = agg.value();
        assert_eq!(v.a0, 30);
        assert_eq!(v.a1, Some(2.0));
    }

    #[test]
    fn bundles_three_columns_with_count() {
        let mut agg: Aggregator3<i64, SumI64, Count<i64>, SumI64> =
            Aggregator3::new(|v| *v, |v| *v, |v| *v * 2);
        agg.iterate(&5, false).unwrap();
        agg.iterate(&7, false).unwrap();
        let v = agg.value();
        assert_eq!(v.a0, 12);
        assert_eq!(v.a1, 2);
        assert_eq!(v.a2, 24);
    }
}
