//! Versioned schema: the named collections, their key paths and secondary indexes.

/// Current schema version. Bump for any schema change; keep changes additive.
pub const DATABASE_VERSION: u64 = 1;

/// Tree holding store metadata
pub(crate) const META_TREE: &str = "meta";

/// Key under which the schema version is recorded
pub(crate) const VERSION_KEY: &str = "schema_version";

/// Secondary index definition
#[derive(Debug)]
pub struct IndexSchema {
    pub name: &'static str,
    /// Top-level field whose value is indexed
    pub key_path: &'static str,
    pub unique: bool,
}

/// Collection definition
#[derive(Debug)]
pub struct CollectionSchema {
    pub name: &'static str,
    /// Top-level field holding the primary key
    pub key_path: &'static str,
    pub indexes: &'static [IndexSchema],
}

impl CollectionSchema {
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Name of the sled tree backing one of this collection's indexes
    pub(crate) fn index_tree_name(&self, index: &IndexSchema) -> String {
        format!("{}.by.{}", self.name, index.name)
    }
}

static RECORDS: CollectionSchema = CollectionSchema {
    name: "records",
    key_path: "id",
    indexes: &[
        IndexSchema {
            name: "latinName",
            key_path: "latinName",
            unique: false,
        },
        IndexSchema {
            name: "createdAt",
            key_path: "createdAt",
            unique: false,
        },
    ],
};

static IMAGES: CollectionSchema = CollectionSchema {
    name: "images",
    key_path: "id",
    indexes: &[],
};

/// Named collection within the object store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Records,
    Images,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Records, Collection::Images];

    pub fn schema(&self) -> &'static CollectionSchema {
        match self {
            Collection::Records => &RECORDS,
            Collection::Images => &IMAGES,
        }
    }

    pub fn name(&self) -> &'static str {
        self.schema().name
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
