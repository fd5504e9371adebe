//! The nested root fixture: a root owning a three-level chain whose last
//! level is optional, plus an integer-backed enum on the first level.

use super::MemoryConnection;
use bulkmodel::{
    Dialect, EntitySchema, EnumMember, EnumType, FieldDef, NamingConvention, Node, OwnedDef,
    OwnedEntity, Result, RootEntity, RootSchema, SqlEnum, TableMapping,
};

pub const NESTED_ENUM: EnumType = EnumType::new(
    "EnumType",
    &[EnumMember::new("A", 1), EnumMember::new("B", 2)],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedEnum {
    A,
    B,
}

impl SqlEnum for NestedEnum {
    const TYPE: &'static EnumType = &NESTED_ENUM;

    fn member_name(self) -> &'static str {
        match self {
            NestedEnum::A => "A",
            NestedEnum::B => "B",
        }
    }

    fn from_member_name(name: &str) -> Option<Self> {
        match name {
            "A" => Some(NestedEnum::A),
            "B" => Some(NestedEnum::B),
            _ => None,
        }
    }
}

const THIRD: EntitySchema = EntitySchema::new("ThirdNested").fields(&[
    FieldDef::text("ThirdNestedProperty"),
    FieldDef::text("Note").nullable(true),
]);

const SECOND: EntitySchema = EntitySchema::new("SecondNested")
    .fields(&[FieldDef::text("SecondNestedProperty")])
    .owned(&[OwnedDef::optional("ThirdNested", &THIRD)]);

const FIRST: EntitySchema = EntitySchema::new("FirstNested")
    .fields(&[
        FieldDef::text("FirstNestedProperty"),
        FieldDef::enumeration("Enum", &NESTED_ENUM),
    ])
    .owned(&[OwnedDef::required("SecondNested", &SECOND)]);

const ROOT: EntitySchema = EntitySchema::new("NestedRoot")
    .fields(&[FieldDef::text("NestedRootId")])
    .owned(&[OwnedDef::required("FirstNested", &FIRST)]);

pub const TABLE: RootSchema = RootSchema::new("NestedRoot", &["NestedRootId"], &ROOT);

#[derive(Debug, Clone, PartialEq)]
pub struct ThirdNested {
    pub third_nested_property: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecondNested {
    pub second_nested_property: String,
    pub third_nested: Option<ThirdNested>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FirstNested {
    pub first_nested_property: String,
    pub kind: NestedEnum,
    pub second_nested: SecondNested,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedRoot {
    pub nested_root_id: String,
    pub first_nested: FirstNested,
}

impl OwnedEntity for ThirdNested {
    const SCHEMA: &'static EntitySchema = &THIRD;

    fn to_node(&self) -> Node {
        Node::new()
            .with_value("ThirdNestedProperty", self.third_nested_property.as_str())
            .with_value("Note", self.note.clone())
    }

    fn from_node(mut node: Node) -> Result<Self> {
        Ok(Self {
            third_nested_property: node.take_value("ThirdNestedProperty")?,
            note: node.take_value("Note")?,
        })
    }
}

impl OwnedEntity for SecondNested {
    const SCHEMA: &'static EntitySchema = &SECOND;

    fn to_node(&self) -> Node {
        Node::new()
            .with_value("SecondNestedProperty", self.second_nested_property.as_str())
            .with_entity("ThirdNested", self.third_nested.as_ref())
    }

    fn from_node(mut node: Node) -> Result<Self> {
        Ok(Self {
            second_nested_property: node.take_value("SecondNestedProperty")?,
            third_nested: node.take_owned("ThirdNested")?,
        })
    }
}

impl OwnedEntity for FirstNested {
    const SCHEMA: &'static EntitySchema = &FIRST;

    fn to_node(&self) -> Node {
        Node::new()
            .with_value("FirstNestedProperty", self.first_nested_property.as_str())
            .with_enum("Enum", self.kind)
            .with_entity("SecondNested", Some(&self.second_nested))
    }

    fn from_node(mut node: Node) -> Result<Self> {
        Ok(Self {
            first_nested_property: node.take_value("FirstNestedProperty")?,
            kind: node.take_enum("Enum")?,
            second_nested: node.take_required("SecondNested")?,
        })
    }
}

impl OwnedEntity for NestedRoot {
    const SCHEMA: &'static EntitySchema = &ROOT;

    fn to_node(&self) -> Node {
        Node::new()
            .with_value("NestedRootId", self.nested_root_id.as_str())
            .with_entity("FirstNested", Some(&self.first_nested))
    }

    fn from_node(mut node: Node) -> Result<Self> {
        Ok(Self {
            nested_root_id: node.take_value("NestedRootId")?,
            first_nested: node.take_required("FirstNested")?,
        })
    }
}

impl RootEntity for NestedRoot {
    const ROOT: &'static RootSchema = &TABLE;
}

/// The canonical single-row fixture.
pub fn fixture() -> NestedRoot {
    NestedRoot {
        nested_root_id: "nestedrootid".to_string(),
        first_nested: FirstNested {
            first_nested_property: "firstnested".to_string(),
            kind: NestedEnum::B,
            second_nested: SecondNested {
                second_nested_property: "secondnested".to_string(),
                third_nested: Some(ThirdNested {
                    third_nested_property: "thirdnested".to_string(),
                    note: None,
                }),
            },
        },
    }
}

/// A distinct root per `n`; keys sort in `n` order.
pub fn root(n: usize) -> NestedRoot {
    NestedRoot {
        nested_root_id: format!("root{n:03}"),
        first_nested: FirstNested {
            first_nested_property: format!("first{n}"),
            kind: if n % 2 == 0 { NestedEnum::A } else { NestedEnum::B },
            second_nested: SecondNested {
                second_nested_property: format!("second{n}"),
                third_nested: (n % 3 != 0).then(|| ThirdNested {
                    third_nested_property: format!("third{n}"),
                    note: (n % 2 == 0).then(|| format!("note{n}")),
                }),
            },
        },
    }
}

pub fn roots(range: std::ops::Range<usize>) -> Vec<NestedRoot> {
    range.map(root).collect()
}

/// A fake connection with the `NestedRoot` table created.
pub fn connection(dialect: Dialect) -> MemoryConnection {
    connection_with(dialect, NamingConvention::default())
}

pub fn connection_with(dialect: Dialect, naming: NamingConvention) -> MemoryConnection {
    let mapping = TableMapping::of_with::<NestedRoot>(naming).expect("fixture mapping");
    MemoryConnection::new(dialect).with_table(
        mapping.table(),
        mapping.column_names(),
        &["NestedRootId"],
    )
}
