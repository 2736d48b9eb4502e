//! Type descriptors shared by the Fortran and Comal front-ends

use crate::compiler::common::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Highest rank either front-end can declare
pub const MAX_RANK: usize = 7;

/// Dynamic extents are only verified up to this rank, anything above is rejected
pub const MAX_DYNAMIC_RANK: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Integer,
    Double,
    Char,
    Boolean,
    Label,
    Void,
}
impl BaseType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Double)
    }
    /// Types that can be stored in a variable or array element
    pub fn is_storable(&self) -> bool {
        !matches!(self, BaseType::Label | BaseType::Void)
    }
}
impl Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BaseType::Integer => "INTEGER",
                BaseType::Double => "DOUBLE",
                BaseType::Char => "CHAR",
                BaseType::Boolean => "BOOLEAN",
                BaseType::Label => "LABEL",
                BaseType::Void => "VOID",
            }
        )
    }
}

/// One array dimension. Dynamic extents are only known at run time and are checked by
/// the bounds-checks the code generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Extent {
    Fixed(usize),
    Dynamic,
}
impl Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extent::Fixed(n) => write!(f, "{}", n),
            Extent::Dynamic => write!(f, "*"),
        }
    }
}

/// Implicit conversions the type checker is allowed to insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Promotion {
    IntegerToDouble,
}
impl Display for Promotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Promotion::IntegerToDouble => write!(f, "i2d"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub base: BaseType,

    /// Empty for scalars
    #[serde(default)]
    pub dimensions: Vec<Extent>,
}

impl TypeDescriptor {
    pub fn scalar(base: BaseType) -> Self {
        TypeDescriptor { base, dimensions: Vec::new() }
    }
    pub fn array(base: BaseType, dimensions: Vec<Extent>) -> Self {
        TypeDescriptor { base, dimensions }
    }
    pub fn void() -> Self {
        TypeDescriptor::scalar(BaseType::Void)
    }

    pub fn is_scalar(&self) -> bool {
        self.dimensions.is_empty()
    }
    pub fn is_array(&self) -> bool {
        !self.is_scalar()
    }
    pub fn is_void(&self) -> bool {
        self.base == BaseType::Void
    }
    pub fn is_numeric(&self) -> bool {
        self.is_scalar() && self.base.is_numeric()
    }
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
    pub fn has_dynamic_extent(&self) -> bool {
        self.dimensions.iter().any(|e| matches!(e, Extent::Dynamic))
    }

    /// Scalar type of a single array element
    pub fn element_type(&self) -> TypeDescriptor {
        TypeDescriptor::scalar(self.base)
    }

    /// Rejects dimension combinations the back-end cannot size correctly
    pub fn validate_dimensions(&self, name: &str) -> Result<(), ErrorKind> {
        if self.is_scalar() {
            return Ok(());
        }
        if !self.base.is_storable() {
            return Err(ErrorKind::ArrayDimension(format!(
                "array '{}' cannot have element type '{}'",
                name, self.base
            )));
        }
        if self.rank() > MAX_RANK {
            return Err(ErrorKind::ArrayDimension(format!(
                "array '{}' has {} dimensions, at most {} are allowed",
                name,
                self.rank(),
                MAX_RANK
            )));
        }
        if let Some(index) = self.dimensions.iter().position(|e| *e == Extent::Fixed(0)) {
            return Err(ErrorKind::ArrayDimension(format!(
                "dimension {} of array '{}' has to be greater than zero",
                index + 1,
                name
            )));
        }
        if self.has_dynamic_extent() && self.rank() > MAX_DYNAMIC_RANK {
            return Err(ErrorKind::ArrayDimension(format!(
                "array '{}' has {} dimensions, dynamic extents are only supported up to {}",
                name,
                self.rank(),
                MAX_DYNAMIC_RANK
            )));
        }
        Ok(())
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        if self.is_array() {
            let extents: Vec<String> = self.dimensions.iter().map(|e| e.to_string()).collect();
            write!(f, "({})", extents.join(","))?;
        }
        Ok(())
    }
}
