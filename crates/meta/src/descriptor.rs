//! Immutable descriptors for members, attributes and enum values.
//!
//! Descriptors are constructed by generated table builders and never mutated
//! afterwards. Consumers only ever see them through shared references handed
//! out by the [`Registry`](crate::Registry).

use std::any::{Any, TypeId};
use std::fmt;

use indexmap::IndexMap;

bitflags::bitflags! {
	/// Capabilities of a described member.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Access: u8 {
		/// The member value can be read through [`MemberDescriptor::try_get`].
		const READ = 1 << 0;
		/// The member value can be replaced through [`MemberDescriptor::try_set`].
		const WRITE = 1 << 1;
	}
}

/// Literal value of an attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
	/// String literal.
	Str(&'static str),
	/// Integer literal, including folded constant arithmetic.
	Int(i128),
	/// Float literal.
	Float(f64),
	/// Boolean literal.
	Bool(bool),
	/// Character literal.
	Char(char),
	/// Path constant such as `Ordering::Less`, or a bare flag like `skip`.
	Path(&'static str),
	/// Array of constants.
	List(Vec<AttrValue>),
	/// Nested list such as `length(min = 1)`.
	Nested(AttributeDescriptor),
}

impl AttrValue {
	pub fn as_str(&self) -> Option<&'static str> {
		match self {
			Self::Str(s) => Some(*s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i128> {
		match self {
			Self::Int(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(v) => Some(*v),
			_ => None,
		}
	}
}

impl fmt::Display for AttrValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Str(s) => write!(f, "{s:?}"),
			Self::Int(v) => write!(f, "{v}"),
			Self::Float(v) => write!(f, "{v:?}"),
			Self::Bool(v) => write!(f, "{v}"),
			Self::Char(c) => write!(f, "{c:?}"),
			Self::Path(p) => f.write_str(p),
			Self::List(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{item}")?;
				}
				f.write_str("]")
			}
			Self::Nested(attr) => write!(f, "{attr}"),
		}
	}
}

/// An attribute attached to a member or enum value.
///
/// The kind is the attribute path as written (`serde`, `doc`, `validate`).
/// Positional arguments keep source order; named arguments keep insertion
/// order and have unique keys.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
	kind: &'static str,
	args: Vec<AttrValue>,
	named: IndexMap<&'static str, AttrValue>,
}

impl AttributeDescriptor {
	pub fn new(kind: &'static str) -> Self {
		Self {
			kind,
			args: Vec::new(),
			named: IndexMap::new(),
		}
	}

	/// Appends a positional argument.
	pub fn arg(mut self, value: AttrValue) -> Self {
		self.args.push(value);
		self
	}

	/// Adds a named argument. A repeated key replaces the previous value.
	pub fn named(mut self, name: &'static str, value: AttrValue) -> Self {
		self.named.insert(name, value);
		self
	}

	pub fn kind(&self) -> &'static str {
		self.kind
	}

	pub fn args(&self) -> &[AttrValue] {
		&self.args
	}

	pub fn named_args(&self) -> &IndexMap<&'static str, AttrValue> {
		&self.named
	}

	/// Looks up a named argument.
	pub fn get(&self, name: &str) -> Option<&AttrValue> {
		self.named.get(name)
	}

	/// Whether this attribute has the given kind.
	pub fn is(&self, kind: &str) -> bool {
		self.kind == kind
	}
}

impl fmt::Display for AttributeDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.kind)?;
		if self.args.is_empty() && self.named.is_empty() {
			return Ok(());
		}
		f.write_str("(")?;
		let mut first = true;
		for arg in &self.args {
			if !first {
				f.write_str(", ")?;
			}
			first = false;
			write!(f, "{arg}")?;
		}
		for (name, value) in &self.named {
			if !first {
				f.write_str(", ")?;
			}
			first = false;
			write!(f, "{name} = {value}")?;
		}
		f.write_str(")")
	}
}

/// Type-erased accessor pair for one field of one closed type.
trait ErasedField: Send + Sync {
	fn owner(&self) -> TypeId;
	fn value_type(&self) -> TypeId;
	fn value_type_name(&self) -> &'static str;
	fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any>;
	fn set(&self, instance: &mut dyn Any, value: Box<dyn Any>) -> Result<(), Box<dyn Any>>;
}

struct Field<O, F> {
	get: fn(&O) -> &F,
	set: Option<fn(&mut O) -> &mut F>,
}

impl<O: Any, F: Any> ErasedField for Field<O, F> {
	fn owner(&self) -> TypeId {
		TypeId::of::<O>()
	}

	fn value_type(&self) -> TypeId {
		TypeId::of::<F>()
	}

	fn value_type_name(&self) -> &'static str {
		std::any::type_name::<F>()
	}

	fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
		let owner = instance.downcast_ref::<O>()?;
		Some((self.get)(owner) as &dyn Any)
	}

	fn set(&self, instance: &mut dyn Any, value: Box<dyn Any>) -> Result<(), Box<dyn Any>> {
		let Some(set) = self.set else {
			return Err(value);
		};
		let Some(owner) = instance.downcast_mut::<O>() else {
			return Err(value);
		};
		let value = value.downcast::<F>()?;
		*set(owner) = *value;
		Ok(())
	}
}

/// Describes one data member of a closed type.
pub struct MemberDescriptor {
	name: &'static str,
	declared_type: &'static str,
	owner_name: &'static str,
	access: Access,
	attributes: Vec<AttributeDescriptor>,
	field: Box<dyn ErasedField>,
}

impl MemberDescriptor {
	/// Member name; tuple fields use their index.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Value type as written at the declaration, after generic substitution.
	pub fn declared_type(&self) -> &'static str {
		self.declared_type
	}

	/// `TypeId` of the member value.
	pub fn value_type(&self) -> TypeId {
		self.field.value_type()
	}

	/// Compiler-provided name of the member value type.
	pub fn value_type_name(&self) -> &'static str {
		self.field.value_type_name()
	}

	/// `TypeId` of the declaring type.
	pub fn owner(&self) -> TypeId {
		self.field.owner()
	}

	pub fn owner_name(&self) -> &'static str {
		self.owner_name
	}

	pub fn access(&self) -> Access {
		self.access
	}

	pub fn is_readable(&self) -> bool {
		self.access.contains(Access::READ)
	}

	pub fn is_writable(&self) -> bool {
		self.access.contains(Access::WRITE)
	}

	pub fn attributes(&self) -> &[AttributeDescriptor] {
		&self.attributes
	}

	/// First attribute of the given kind.
	pub fn attribute(&self, kind: &str) -> Option<&AttributeDescriptor> {
		self.attributes.iter().find(|a| a.is(kind))
	}

	/// Reads the member from `instance`.
	///
	/// Returns `None` when `instance` is not of the declaring type. A wrong
	/// instance type is an expected outcome, not an error.
	pub fn try_get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
		if !self.is_readable() {
			return None;
		}
		self.field.get(instance)
	}

	/// Typed form of [`try_get`](Self::try_get).
	pub fn try_get_as<'a, V: Any>(&self, instance: &'a dyn Any) -> Option<&'a V> {
		self.try_get(instance)?.downcast_ref::<V>()
	}

	/// Replaces the member value on `instance`.
	///
	/// Returns `false` when the member is not writable, `instance` is not of the
	/// declaring type, or `value` is not of the member's value type.
	pub fn try_set(&self, instance: &mut dyn Any, value: Box<dyn Any>) -> bool {
		if !self.is_writable() {
			return false;
		}
		self.field.set(instance, value).is_ok()
	}

	/// Typed form of [`try_set`](Self::try_set).
	pub fn try_set_value<V: Any>(&self, instance: &mut dyn Any, value: V) -> bool {
		self.try_set(instance, Box::new(value))
	}
}

impl fmt::Debug for MemberDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemberDescriptor")
			.field("name", &self.name)
			.field("declared_type", &self.declared_type)
			.field("owner", &self.owner_name)
			.field("access", &self.access)
			.field("attributes", &self.attributes)
			.finish()
	}
}

impl fmt::Display for MemberDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.name, self.declared_type)?;
		if !self.attributes.is_empty() {
			f.write_str(" [")?;
			for (i, attr) in self.attributes.iter().enumerate() {
				if i > 0 {
					f.write_str(", ")?;
				}
				write!(f, "{attr}")?;
			}
			f.write_str("]")?;
		}
		Ok(())
	}
}

/// Builds a [`MemberDescriptor`] from typed accessors.
///
/// Generated table builders name the declaring type and let the field type be
/// inferred from the getter:
///
/// ```ignore
/// MemberBuilder::<User, _>::new("name", "String", |v| &v.name)
///     .writable(|v| &mut v.name)
///     .build()
/// ```
pub struct MemberBuilder<O, F> {
	name: &'static str,
	declared_type: &'static str,
	get: fn(&O) -> &F,
	set: Option<fn(&mut O) -> &mut F>,
	attributes: Vec<AttributeDescriptor>,
}

impl<O: Any, F: Any> MemberBuilder<O, F> {
	pub fn new(name: &'static str, declared_type: &'static str, get: fn(&O) -> &F) -> Self {
		Self {
			name,
			declared_type,
			get,
			set: None,
			attributes: Vec::new(),
		}
	}

	pub fn writable(mut self, set: fn(&mut O) -> &mut F) -> Self {
		self.set = Some(set);
		self
	}

	pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
		self.attributes.push(attribute);
		self
	}

	pub fn build(self) -> MemberDescriptor {
		let mut access = Access::READ;
		access.set(Access::WRITE, self.set.is_some());
		MemberDescriptor {
			name: self.name,
			declared_type: self.declared_type,
			owner_name: std::any::type_name::<O>(),
			access,
			attributes: self.attributes,
			field: Box::new(Field {
				get: self.get,
				set: self.set,
			}),
		}
	}
}

/// Describes one value of a fieldless enum.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDescriptor {
	name: &'static str,
	value: i128,
	key: i64,
	attributes: Vec<AttributeDescriptor>,
}

impl EnumValueDescriptor {
	pub fn new(name: &'static str, value: i128, key: i64) -> Self {
		Self {
			name,
			value,
			key,
			attributes: Vec::new(),
		}
	}

	pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
		self.attributes.push(attribute);
		self
	}

	/// Variant name.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Discriminant value.
	pub fn value(&self) -> i128 {
		self.value
	}

	/// Lookup key; the discriminant wrapped to `i64`.
	pub fn key(&self) -> i64 {
		self.key
	}

	pub fn attributes(&self) -> &[AttributeDescriptor] {
		&self.attributes
	}

	pub fn attribute_of(&self, kind: &str) -> Option<&AttributeDescriptor> {
		self.attributes.iter().find(|a| a.is(kind))
	}
}

impl fmt::Display for EnumValueDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} = {}", self.name, self.value)
	}
}
