//! Declared attributes of a resource type.

/// Shape of a declared attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKind {
  #[default]
  Scalar,
  /// A flat array of primitives, compared element-wise
  Array,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
  pub name: String,
  pub kind: FieldKind,
}

impl FieldDef {
  pub fn scalar(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      kind: FieldKind::Scalar,
    }
  }

  pub fn array(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      kind: FieldKind::Array,
    }
  }

  /// Parse a declaration such as `name`, `tags[]` or `tags.[]`.
  pub fn parse(declaration: &str) -> Self {
    let declaration = declaration.trim();
    match declaration
      .strip_suffix(".[]")
      .or_else(|| declaration.strip_suffix("[]"))
    {
      Some(name) => Self::array(name),
      None => Self::scalar(declaration),
    }
  }
}

/// Ordered list of declared attributes.
///
/// Only declared attributes take part in dirty tracking, snapshots and save
/// bodies; other fields may still be present on a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
  fields: Vec<FieldDef>,
}

impl Schema {
  pub fn new(fields: Vec<FieldDef>) -> Self {
    Self { fields }
  }

  /// Build a schema from declarations, see `FieldDef::parse`.
  pub fn from_attrs<I, S>(attrs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self::new(attrs.into_iter().map(|a| FieldDef::parse(a.as_ref())).collect())
  }

  pub fn fields(&self) -> &[FieldDef] {
    &self.fields
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.fields.iter().map(|f| f.name.as_str())
  }

  pub fn get(&self, name: &str) -> Option<&FieldDef> {
    self.fields.iter().find(|f| f.name == name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.get(name).is_some()
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }
}
