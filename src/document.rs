use std::fmt;

/// The fixed field vocabulary of an indexed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetField {
    Id,
    Title,
    Description,
    Author,
    Tags,
    Classes,
    Entities,
    Literals,
    Properties,
}

impl DatasetField {
    /// Every field except `id`, in schema order.
    pub const TEXT: [DatasetField; 8] = [
        DatasetField::Title,
        DatasetField::Description,
        DatasetField::Author,
        DatasetField::Tags,
        DatasetField::Classes,
        DatasetField::Entities,
        DatasetField::Literals,
        DatasetField::Properties,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetField::Id => "id",
            DatasetField::Title => "title",
            DatasetField::Description => "description",
            DatasetField::Author => "author",
            DatasetField::Tags => "tags",
            DatasetField::Classes => "classes",
            DatasetField::Entities => "entities",
            DatasetField::Literals => "literals",
            DatasetField::Properties => "properties",
        }
    }
}

impl fmt::Display for DatasetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic bucket assigned to a triple term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Classes,
    Entities,
    Literals,
    Properties,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Classes,
        Bucket::Entities,
        Bucket::Literals,
        Bucket::Properties,
    ];

    pub fn field(self) -> DatasetField {
        match self {
            Bucket::Classes => DatasetField::Classes,
            Bucket::Entities => DatasetField::Entities,
            Bucket::Literals => DatasetField::Literals,
            Bucket::Properties => DatasetField::Properties,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.field().as_str()
    }
}

/// One composite document per dataset.
///
/// Values are kept in insertion order. The `id` is held apart from the
/// other fields so it can only ever be set once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetDocument {
    id: Option<String>,
    values: Vec<(DatasetField, String)>,
}

impl DatasetDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            values: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set the id unless one is already present. Returns whether it was set.
    pub fn set_id_if_absent(&mut self, id: impl Into<String>) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id.into());
        true
    }

    /// Append a value. Values for [`DatasetField::Id`] go through
    /// [`Self::set_id_if_absent`].
    pub fn push(&mut self, field: DatasetField, value: impl Into<String>) {
        if field == DatasetField::Id {
            self.set_id_if_absent(value);
            return;
        }
        self.values.push((field, value.into()));
    }

    pub fn push_bucket(&mut self, bucket: Bucket, value: impl Into<String>) {
        self.values.push((bucket.field(), value.into()));
    }

    pub fn values(&self, field: DatasetField) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(move |(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn first(&self, field: DatasetField) -> Option<&str> {
        self.values(field).next()
    }

    pub fn entries(&self) -> impl Iterator<Item = (DatasetField, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Number of non-id values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
