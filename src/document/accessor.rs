use std::collections::BTreeMap;

use serde_json::Value;

/// glTF accessor component type, keyed by its GL enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            5120 => Some(ComponentType::I8),
            5121 => Some(ComponentType::U8),
            5122 => Some(ComponentType::I16),
            5123 => Some(ComponentType::U16),
            5125 => Some(ComponentType::U32),
            5126 => Some(ComponentType::F32),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ComponentType::I8 => 5120,
            ComponentType::U8 => 5121,
            ComponentType::I16 => 5122,
            ComponentType::U16 => 5123,
            ComponentType::U32 => 5125,
            ComponentType::F32 => 5126,
        }
    }

    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "SCALAR" => Some(ElementType::Scalar),
            "VEC2" => Some(ElementType::Vec2),
            "VEC3" => Some(ElementType::Vec3),
            "VEC4" => Some(ElementType::Vec4),
            "MAT2" => Some(ElementType::Mat2),
            "MAT3" => Some(ElementType::Mat3),
            "MAT4" => Some(ElementType::Mat4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Scalar => "SCALAR",
            ElementType::Vec2 => "VEC2",
            ElementType::Vec3 => "VEC3",
            ElementType::Vec4 => "VEC4",
            ElementType::Mat2 => "MAT2",
            ElementType::Mat3 => "MAT3",
            ElementType::Mat4 => "MAT4",
        }
    }

    pub fn components(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 | ElementType::Mat2 => 4,
            ElementType::Mat3 => 9,
            ElementType::Mat4 => 16,
        }
    }

    /// Column count and rows per column for matrix types.
    fn columns(self) -> Option<(usize, usize)> {
        match self {
            ElementType::Mat2 => Some((2, 2)),
            ElementType::Mat3 => Some((3, 3)),
            ElementType::Mat4 => Some((4, 4)),
            _ => None,
        }
    }
}

/// Byte size of one element, including the column padding glTF requires for
/// `MAT2`/`MAT3` with 1- and 2-byte components.
pub fn element_size(component: ComponentType, element: ElementType) -> usize {
    match element.columns() {
        Some((columns, rows)) => {
            let column = rows * component.size();
            columns * crate::container::align4(column)
        }
        None => element.components() * component.size(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseIndices {
    pub buffer_view: usize,
    pub byte_offset: usize,
    pub component_type: ComponentType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseValues {
    pub buffer_view: usize,
    pub byte_offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseAccessor {
    pub count: usize,
    pub indices: SparseIndices,
    pub values: SparseValues,
}

impl SparseAccessor {
    /// Bytes of the indices view the sparse indices touch. `None` on overflow.
    pub fn indices_extent(&self) -> Option<usize> {
        self.count
            .checked_mul(self.indices.component_type.size())?
            .checked_add(self.indices.byte_offset)
    }

    /// Bytes of the values view the substituted elements touch. `None` on overflow.
    pub fn values_extent(&self, element_size: usize) -> Option<usize> {
        self.count
            .checked_mul(element_size)?
            .checked_add(self.values.byte_offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub name: Option<String>,
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub count: usize,
    pub normalized: bool,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub sparse: Option<SparseAccessor>,
    pub extensions: BTreeMap<String, Value>,
    pub extras: Option<Value>,
}

impl Accessor {
    pub fn new(component_type: ComponentType, element_type: ElementType, count: usize) -> Self {
        Self {
            name: None,
            buffer_view: None,
            byte_offset: 0,
            component_type,
            element_type,
            count,
            normalized: false,
            min: Vec::new(),
            max: Vec::new(),
            sparse: None,
            extensions: BTreeMap::new(),
            extras: None,
        }
    }

    pub fn element_size(&self) -> usize {
        element_size(self.component_type, self.element_type)
    }

    /// Bytes of the buffer view this accessor touches, starting at view offset 0.
    ///
    /// With a stride the last element only contributes its own size, matching
    /// how glTF validators compute the accessor extent. `None` when the extent
    /// does not fit in `usize`.
    pub fn extent_in_view(&self, byte_stride: Option<usize>) -> Option<usize> {
        let Some(last) = self.count.checked_sub(1) else {
            return Some(self.byte_offset);
        };
        let element = self.element_size();
        let stride = byte_stride.unwrap_or(element);
        stride
            .checked_mul(last)?
            .checked_add(element)?
            .checked_add(self.byte_offset)
    }

    /// Length of the tightly packed data, ignoring any stride.
    pub fn packed_length(&self) -> Option<usize> {
        self.count.checked_mul(self.element_size())
    }
}
