use alloc::boxed::Box;
use alloc::vec::Vec;

/// Concrete shape of an instruction result
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Shape(Box<[usize]>);

impl Shape {
    /// Get shape's rank
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.0.len()
    }

    /// Get number of elements in tensor with this shape
    /// (a product of it's dimensions).
    #[must_use]
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Iter
    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.into_iter()
    }

    /// Dimensions as slice
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl core::ops::Index<usize> for Shape {
    type Output = usize;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Shape(value.into_boxed_slice())
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Shape(value.into())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Shape(value.into())
    }
}

impl From<usize> for Shape {
    fn from(value: usize) -> Self {
        Shape([value].into())
    }
}

impl<'a> IntoIterator for &'a Shape {
    type Item = &'a usize;
    type IntoIter = <&'a [usize] as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl core::fmt::Display for Shape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_fmt(format_args!("{d}"))?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::Shape;

    #[test]
    fn shape_basics() {
        let shape = Shape::from([2, 3, 4]);
        assert_eq!(shape.numel(), 24);
        assert_eq!(shape.rank(), 3);
        assert_eq!(shape[2], 4);
        assert_eq!(shape.to_string(), "[2, 3, 4]");
    }
}
