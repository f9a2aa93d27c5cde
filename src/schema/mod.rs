//! Schema model for the dispatch layer.
//!
//! A host declares its object types, enums and bitmasks as plain data. The
//! dispatch tables are built once from this model; nothing here performs a
//! call. Enum and bitmask range checks live on the declared types so the
//! validating entries can stay table-driven.

use bitflags::bitflags;

#[cfg(feature = "sabaki-serde")]
use serde::{Deserialize, Serialize};

/// Index of a declared type within its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct TypeId(pub u16);

/// Index of a method within its object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct MethodId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub enum NativeKind {
    U32,
    I32,
    F32,
    Bool,
    Char,
}

/// Declared type of a method argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub enum ArgType {
    Native(NativeKind),
    Enum(TypeId),
    Bitmask(TypeId),
    Object(TypeId),
}

/// How an argument is carried across the call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub enum Annotation {
    /// Passed by value.
    Value,
    /// Borrowed slice with an explicit length.
    Slice,
    /// Borrowed string.
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub enum ReturnType {
    Void,
    Native(NativeKind),
    Object(TypeId),
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct ArgDesc {
    pub name: String,
    pub ty: ArgType,
    pub annotation: Annotation,
}

impl ArgDesc {
    pub fn value(name: &str, ty: ArgType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            annotation: Annotation::Value,
        }
    }

    pub fn slice(name: &str, ty: ArgType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            annotation: Annotation::Slice,
        }
    }

    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ArgType::Native(NativeKind::Char),
            annotation: Annotation::Str,
        }
    }
}

bitflags! {
    /// Per-method facts fixed when the schema is built.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodTraits: u8 {
        /// Reference-count adjustment; exempt from consumption checks.
        const LIFECYCLE         = 0x1;
        /// Designated finalizing call of a builder type.
        const FINALIZER         = 0x2;
        /// Runs the backend's extra validation hook after the base checks.
        const CUSTOM_VALIDATION = 0x4;
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct MethodDesc {
    pub name: String,
    pub args: Vec<ArgDesc>,
    pub ret: ReturnType,
    pub traits: MethodTraits,
}

impl MethodDesc {
    pub fn is_lifecycle(&self) -> bool {
        self.traits.contains(MethodTraits::LIFECYCLE)
    }

    pub fn is_finalizer(&self) -> bool {
        self.traits.contains(MethodTraits::FINALIZER)
    }

    pub fn has_custom_validation(&self) -> bool {
        self.traits.contains(MethodTraits::CUSTOM_VALIDATION)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct ObjectType {
    pub name: String,
    pub is_builder: bool,
    pub methods: Vec<MethodDesc>,
    slot_base: usize,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct NamedValue {
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct EnumType {
    pub name: String,
    pub values: Vec<NamedValue>,
}

impl EnumType {
    /// Exact-set membership. Declared values need not be contiguous, so no
    /// range interpolation here.
    pub fn is_valid(&self, raw: u32) -> bool {
        self.values.iter().any(|v| v.value == raw)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct BitmaskType {
    pub name: String,
    pub bits: Vec<NamedValue>,
    pub full_mask: u32,
}

impl BitmaskType {
    /// Valid iff every set bit is declared. Zero is always a valid mask.
    pub fn is_valid(&self, raw: u32) -> bool {
        raw & !self.full_mask == 0
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub enum TypeDesc {
    Object(ObjectType),
    Enum(EnumType),
    Bitmask(BitmaskType),
}

impl TypeDesc {
    pub fn name(&self) -> &str {
        match self {
            TypeDesc::Object(o) => &o.name,
            TypeDesc::Enum(e) => &e.name,
            TypeDesc::Bitmask(b) => &b.name,
        }
    }
}

/// Immutable type/method graph the dispatch tables are generated from.
///
/// Ids are handed out by [`SchemaBuilder`], so a schema can never reference
/// a type it does not contain.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sabaki-serde", derive(Serialize, Deserialize))]
pub struct Schema {
    types: Vec<TypeDesc>,
    proc_count: usize,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder { types: Vec::new() }
    }

    pub fn types(&self) -> &[TypeDesc] {
        &self.types
    }

    pub fn type_desc(&self, id: TypeId) -> Option<&TypeDesc> {
        self.types.get(usize::from(id.0))
    }

    pub fn type_name(&self, id: TypeId) -> &str {
        self.type_desc(id).map(TypeDesc::name).unwrap_or("<unknown>")
    }

    pub fn object(&self, id: TypeId) -> Option<&ObjectType> {
        match self.type_desc(id)? {
            TypeDesc::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn enum_type(&self, id: TypeId) -> Option<&EnumType> {
        match self.type_desc(id)? {
            TypeDesc::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn bitmask(&self, id: TypeId) -> Option<&BitmaskType> {
        match self.type_desc(id)? {
            TypeDesc::Bitmask(b) => Some(b),
            _ => None,
        }
    }

    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name() == name)
            .map(|i| TypeId(i as u16))
    }

    pub fn method(&self, ty: TypeId, method: MethodId) -> Option<&MethodDesc> {
        self.object(ty)?.methods.get(usize::from(method.0))
    }

    pub fn find_method(&self, ty: TypeId, name: &str) -> Option<MethodId> {
        self.object(ty)?
            .methods
            .iter()
            .position(|m| m.name == name)
            .map(|i| MethodId(i as u16))
    }

    /// Flat index of the (type, method) pair in a proc table.
    pub fn proc_slot(&self, ty: TypeId, method: MethodId) -> Option<usize> {
        let obj = self.object(ty)?;
        if usize::from(method.0) >= obj.methods.len() {
            return None;
        }
        Some(obj.slot_base + usize::from(method.0))
    }

    /// Total number of (object, method) pairs across the schema.
    pub fn proc_count(&self) -> usize {
        self.proc_count
    }

    /// Iterate object types with their ids.
    pub fn objects(&self) -> impl Iterator<Item = (TypeId, &ObjectType)> {
        self.types.iter().enumerate().filter_map(|(i, t)| match t {
            TypeDesc::Object(o) => Some((TypeId(i as u16), o)),
            _ => None,
        })
    }
}

/// Builds a [`Schema`]. Misuse (declaring a method on an enum id, a
/// finalizer on a non-builder) is a construction-time programming error and
/// panics; a finished schema is internally consistent by construction.
pub struct SchemaBuilder {
    types: Vec<TypeDesc>,
}

impl SchemaBuilder {
    pub fn enum_type(&mut self, name: &str, values: &[(&str, u32)]) -> TypeId {
        self.push(TypeDesc::Enum(EnumType {
            name: name.to_string(),
            values: named(values),
        }))
    }

    pub fn bitmask(&mut self, name: &str, bits: &[(&str, u32)]) -> TypeId {
        let full_mask = bits.iter().fold(0, |mask, (_, bit)| mask | bit);
        self.push(TypeDesc::Bitmask(BitmaskType {
            name: name.to_string(),
            bits: named(bits),
            full_mask,
        }))
    }

    pub fn object(&mut self, name: &str) -> TypeId {
        self.push_object(name, false)
    }

    /// Declare a builder object type: its instances accumulate state across
    /// calls and are consumed by their finalizing method.
    pub fn builder_object(&mut self, name: &str) -> TypeId {
        self.push_object(name, true)
    }

    pub fn method(
        &mut self,
        ty: TypeId,
        name: &str,
        args: Vec<ArgDesc>,
        ret: ReturnType,
    ) -> MethodId {
        self.push_method(ty, name, args, ret, MethodTraits::empty())
    }

    /// Declare the designated finalizing method of a builder type.
    pub fn finalizer(
        &mut self,
        ty: TypeId,
        name: &str,
        args: Vec<ArgDesc>,
        ret: ReturnType,
    ) -> MethodId {
        assert!(
            self.object_mut(ty).is_builder,
            "finalizer declared on non-builder type"
        );
        self.push_method(ty, name, args, ret, MethodTraits::FINALIZER)
    }

    /// Opt a method into the backend's extra validation hook.
    pub fn custom_validation(&mut self, ty: TypeId, method: MethodId) {
        let obj = self.object_mut(ty);
        let m = obj
            .methods
            .get_mut(usize::from(method.0))
            .expect("unknown method id");
        m.traits |= MethodTraits::CUSTOM_VALIDATION;
    }

    /// Finish the schema. Every object type gets `reference`/`release`
    /// lifecycle methods appended if not already declared, and flat proc
    /// slots are laid out.
    pub fn finish(mut self) -> Schema {
        for desc in &mut self.types {
            if let TypeDesc::Object(obj) = desc {
                for name in ["reference", "release"] {
                    if !obj.methods.iter().any(|m| m.name == name) {
                        obj.methods.push(MethodDesc {
                            name: name.to_string(),
                            args: Vec::new(),
                            ret: ReturnType::Void,
                            traits: MethodTraits::LIFECYCLE,
                        });
                    }
                }
            }
        }

        let mut proc_count = 0;
        for desc in &mut self.types {
            if let TypeDesc::Object(obj) = desc {
                obj.slot_base = proc_count;
                proc_count += obj.methods.len();
            }
        }

        Schema {
            types: self.types,
            proc_count,
        }
    }

    fn push(&mut self, desc: TypeDesc) -> TypeId {
        assert!(self.types.len() < usize::from(u16::MAX), "too many types");
        self.types.push(desc);
        TypeId((self.types.len() - 1) as u16)
    }

    fn push_object(&mut self, name: &str, is_builder: bool) -> TypeId {
        self.push(TypeDesc::Object(ObjectType {
            name: name.to_string(),
            is_builder,
            methods: Vec::new(),
            slot_base: 0,
        }))
    }

    fn push_method(
        &mut self,
        ty: TypeId,
        name: &str,
        args: Vec<ArgDesc>,
        ret: ReturnType,
        mut traits: MethodTraits,
    ) -> MethodId {
        if matches!(name, "reference" | "release") {
            traits |= MethodTraits::LIFECYCLE;
        }
        let obj = self.object_mut(ty);
        assert!(obj.methods.len() < usize::from(u16::MAX), "too many methods");
        obj.methods.push(MethodDesc {
            name: name.to_string(),
            args,
            ret,
            traits,
        });
        MethodId((obj.methods.len() - 1) as u16)
    }

    fn object_mut(&mut self, ty: TypeId) -> &mut ObjectType {
        match self.types.get_mut(usize::from(ty.0)) {
            Some(TypeDesc::Object(o)) => o,
            _ => panic!("type id does not name an object type"),
        }
    }
}

fn named(pairs: &[(&str, u32)]) -> Vec<NamedValue> {
    pairs
        .iter()
        .map(|(name, value)| NamedValue {
            name: name.to_string(),
            value: *value,
        })
        .collect()
}
