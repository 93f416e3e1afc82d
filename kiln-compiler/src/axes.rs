//! # Axes
//!
//! Normalization of user supplied reduction axes.

use duplicate::duplicate_item;
use kiln_core::{error::KilnError, expr::Expr};

/// # Axes
///
/// Sorted, duplicate free list of real axes, every axis is smaller than
/// the rank it was resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Axes(Box<[usize]>);

impl Axes {
    /// Number of axes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Axes returned by [`real_axes`] are never empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if axes contains axis.
    #[must_use]
    pub fn contains(&self, axis: usize) -> bool {
        self.0.binary_search(&axis).is_ok()
    }

    /// Position of axis within axes
    #[must_use]
    pub fn position(&self, axis: usize) -> Option<usize> {
        self.0.binary_search(&axis).ok()
    }

    /// Iter
    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.0.iter()
    }
}

impl core::ops::Deref for Axes {
    type Target = [usize];
    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl core::fmt::Display for Axes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let res = format!("{:?}", self.0).replace('[', "(").replace(']', ")");
        f.write_str(&res)
    }
}

impl<'a> IntoIterator for &'a Axes {
    type IntoIter = <&'a [usize] as IntoIterator>::IntoIter;
    type Item = &'a usize;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// # `IntoAxes`
/// Raw, possibly negative axes.
/// () and empty lists mean all axes.
#[allow(clippy::module_name_repetitions)]
pub trait IntoAxes {
    /// Signed axes as passed by the user
    fn into_raw_axes(self) -> Vec<i64>;
}

impl IntoAxes for () {
    fn into_raw_axes(self) -> Vec<i64> {
        Vec::new()
    }
}

#[duplicate_item(int; [i32]; [i64]; [isize];)]
impl IntoAxes for int {
    fn into_raw_axes(self) -> Vec<i64> {
        vec![i64::try_from(self).unwrap_or(i64::MAX)]
    }
}

#[duplicate_item(int; [i32]; [i64]; [isize];)]
impl IntoAxes for &[int] {
    fn into_raw_axes(self) -> Vec<i64> {
        self.iter().map(|x| i64::try_from(*x).unwrap_or(i64::MAX)).collect()
    }
}

#[duplicate_item(int; [i32]; [i64]; [isize];)]
impl<const N: usize> IntoAxes for [int; N] {
    fn into_raw_axes(self) -> Vec<i64> {
        self.as_slice().into_raw_axes()
    }
}

#[duplicate_item(int; [i32]; [i64]; [isize];)]
impl IntoAxes for Vec<int> {
    fn into_raw_axes(self) -> Vec<i64> {
        self.as_slice().into_raw_axes()
    }
}

/// Resolve raw axes against tensor of rank `ndim`.
///
/// Empty axes mean all axes. Negative axes count from the back.
/// Every axis must land in `[0, ndim)`, duplicates collapse.
pub fn real_axes(ndim: usize, axes: impl IntoAxes) -> Result<Axes, KilnError> {
    if ndim == 0 {
        return Err(KilnError::invalid_axis(
            "reduction requires tensor with at least one dimension",
        ));
    }
    let raw = axes.into_raw_axes();
    if raw.is_empty() {
        return Ok(Axes((0..ndim).collect()));
    }
    let rank = i64::try_from(ndim).unwrap_or(i64::MAX);
    let mut res = Vec::with_capacity(raw.len());
    for axis in raw {
        let real = if axis < 0 { axis + rank } else { axis };
        match usize::try_from(real) {
            Ok(real) if real < ndim => res.push(real),
            _ => {
                return Err(KilnError::invalid_axis(format!(
                    "{axis} for tensor with {ndim} dimensions"
                )))
            }
        }
    }
    res.sort_unstable();
    res.dedup();
    Ok(Axes(res.into()))
}

/// Shape after reducing `shape` along `real_axes`.
///
/// Reduced dimensions become 1 with `keep_dims`, otherwise they are removed.
/// Reducing every dimension without `keep_dims` gives shape `[1]`.
#[must_use]
pub fn output_shape(real_axes: &Axes, shape: &[Expr], keep_dims: bool) -> Vec<Expr> {
    let mut res: Vec<Expr> = shape
        .iter()
        .enumerate()
        .filter_map(|(i, dim)| match (real_axes.contains(i), keep_dims) {
            (false, _) => Some(dim.clone()),
            (true, true) => Some(Expr::int(1)),
            (true, false) => None,
        })
        .collect();
    if res.is_empty() {
        res.push(Expr::int(1));
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_duplicate_axes() {
        let axes = real_axes(3, [-1, 2, 0, 0]).unwrap();
        assert_eq!(&*axes, [0, 2]);
        assert_eq!(axes.to_string(), "(0, 2)");
        assert_eq!(axes.position(2), Some(1));
    }

    #[test]
    fn out_of_range() {
        assert!(matches!(real_axes(3, 3), Err(KilnError::InvalidAxis(_))));
        assert!(matches!(real_axes(3, -4), Err(KilnError::InvalidAxis(_))));
        assert!(matches!(real_axes(0, ()), Err(KilnError::InvalidAxis(_))));
    }
}
