//! Representative entity fixtures
//!
//! A realistic set of entities exercising the whole attribute-type algebra:
//! references, arrays of references, nested arrays of objects, enums,
//! patterns, defaults (including explicit nulls), buffers and lifecycle
//! methods. The conversion and schema tests run over this set.

use crate::attr::{AttrTypeDef, EntityAttributes};
use crate::entity::{Entity, Method};
use ermeta_core::{
    DisplayedField, EMAIL_PATTERN, MethodEnvironment, MethodType, OfTag, SimpleAttrType,
};
use serde_json::Value;

/// All fixture entities
pub fn system_entities() -> Vec<Entity> {
    vec![
        test_entity(),
        chat_history_entity(),
        command_entity(),
        company_entity(),
        file_entity(),
        global_settings_entity(),
        project_entity(),
        role_entity(),
        user_entity(),
        workspace_entity(),
    ]
}

/// A small entity covering constraints, defaults and methods
pub fn test_entity() -> Entity {
    Entity::new("Test")
        .with_namespace("sys")
        .with_object_title("$NAME")
        .with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .with_match("[a-zA-Z0-9_]+"),
        )
        .with_attribute(
            "match",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String)
            },
        )
        .with_attribute(
            "default",
            AttrTypeDef::of_type(SimpleAttrType::Number).with_default(1000),
        )
        .with_attribute(
            "nonRequiredString",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String).with_default("now")
            },
        )
        .with_attribute(
            "requiredString10_20",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .with_length(10, 20),
        )
        .with_attribute(
            "email",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .unique()
                .with_match(EMAIL_PATTERN),
        )
        .with_attribute(
            "enumField",
            AttrTypeDef::of_type(SimpleAttrType::Enum).with_enum(["one", "two", "three"]),
        )
        .with_method(
            MethodType::BeforeSubmit,
            Method::new("sys", "logMethod", MethodEnvironment::Server)
                .with_description("Logs a message to the console")
                .with_code("js", "console.log(\"Method logMethod called\");"),
        )
        .with_method(
            MethodType::AfterSubmit,
            Method::new("sys", "logMethod", MethodEnvironment::Server)
                .with_description("Logs a message to the console")
                .with_code("js", "console.log(\"Method logMethod called\");")
                .built_in(),
        )
}

/// Reference attribute plus a nested array of message objects
pub fn chat_history_entity() -> Entity {
    let message = EntityAttributes::new()
        .with(
            "role",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .with_enum(["system", "user", "assistant"]),
        )
        .with(
            "content",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with(
            "timestamp",
            AttrTypeDef::of_type(SimpleAttrType::Number).required(),
        )
        .with("debugInfo", SimpleAttrType::String)
        .with("prompt_tokens", SimpleAttrType::Number)
        .with("cached_tokens", SimpleAttrType::Number)
        .with("completion_tokens", SimpleAttrType::Number)
        .with("cost", SimpleAttrType::Number);

    Entity::new("ChatHistory")
        .with_namespace("sys")
        .with_object_title("$name")
        .with_attribute(
            "userId",
            AttrTypeDef::of_type(SimpleAttrType::ObjectId)
                .required()
                .references("User")
                .with_displayed_fields([DisplayedField::new("name")]),
        )
        .with_attribute(
            "type",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with_attribute(
            "data",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(message),
        )
}

/// Self-referencing hierarchy with explicit null defaults
pub fn command_entity() -> Entity {
    Entity::new("Command")
        .with_namespace("sys")
        .with_attribute(
            "parent",
            AttrTypeDef::of_type(SimpleAttrType::ObjectId)
                .references("Command")
                .with_displayed_fields([DisplayedField::new("_id")])
                .with_default(Value::Null),
        )
        .with_attribute(
            "namespace",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with_attribute(
            "label",
            AttrTypeDef::of_type(SimpleAttrType::String).required().trimmed(),
        )
        .with_attribute(
            "cmd",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .trimmed()
                .with_default(Value::Null),
        )
        .with_attribute(
            "cmdtype",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .with_enum(["entity", "folder", "link"])
                .with_default(Value::Null),
        )
        .with_attribute(
            "ordr",
            AttrTypeDef::of_type(SimpleAttrType::Number).with_default(0),
        )
        .with_attribute(
            "iconName",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .trimmed()
                .with_default(Value::Null),
        )
}

/// Entity with an indexed reference attribute
pub fn company_entity() -> Entity {
    Entity::new("Company")
        .with_namespace("sys")
        .with_object_title("$companyName")
        .with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .unique()
                .trimmed(),
        )
        .with_attribute(
            "workspaceId",
            AttrTypeDef::of_type(SimpleAttrType::ObjectId)
                .indexed()
                .required()
                .references("Workspace")
                .with_displayed_fields([DisplayedField::new("_id")]),
        )
}

/// Entity with binary data and hidden/readonly attributes
pub fn file_entity() -> Entity {
    Entity::new("File")
        .with_namespace("sys")
        .with_object_title("$NAME")
        .with_attribute(
            "type",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .with_enum(["Directory", "File"]),
        )
        .with_attribute(
            "fullName",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .with_match("^[^:*\"<>|]+$"),
        )
        .with_attribute(
            "size",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Number)
                    .readonly()
                    .with_label("size (bytes)")
            },
        )
        .with_attribute(
            "textData",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String).hidden()
            },
        )
        .with_attribute(
            "binaryData",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Buffer)
            },
        )
}

/// Minimal enum-typed settings entity
pub fn global_settings_entity() -> Entity {
    Entity::new("GlobalSettings")
        .with_namespace("sys")
        .with_object_title("$name")
        .with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with_attribute(
            "type",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .with_enum(["form"])
                .required(),
        )
        .with_attribute(
            "data",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
}

/// Arrays of simple types, references and nested objects
pub fn project_entity() -> Entity {
    let stage = EntityAttributes::new()
        .with("stage", SimpleAttrType::String)
        .with("done", SimpleAttrType::Boolean)
        .with("visited", SimpleAttrType::Boolean)
        .with("enabled", SimpleAttrType::Boolean);

    let context_file = EntityAttributes::new()
        .with("id", SimpleAttrType::String)
        .with("name", SimpleAttrType::String);

    Entity::new("Project")
        .with_namespace("sys")
        .with_object_title("$NAME")
        .with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with_attribute(
            "application",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with_attribute(
            "namespaces",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(OfTag::String),
        )
        .with_attribute(
            "stages",
            AttrTypeDef::of_type(SimpleAttrType::Array)
                .with_of(stage)
                .required(),
        )
        .with_attribute("currentStage", SimpleAttrType::String)
        .with_attribute("currentPage", SimpleAttrType::String)
        .with_attribute(
            "files",
            AttrTypeDef::of_type(SimpleAttrType::Array)
                .with_of(OfTag::ObjectId)
                .references("File")
                .with_displayed_fields([DisplayedField::new("fullName").readonly()]),
        )
        .with_attribute("gptModel", SimpleAttrType::String)
        .with_attribute(
            "contextFiles",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Array).with_of(context_file)
            },
        )
        .with_attribute("chatMessages", SimpleAttrType::String)
        .with_attribute(
            "activated",
            AttrTypeDef::of_type(SimpleAttrType::Boolean)
                .required()
                .with_default(false),
        )
        .with_attribute(
            "briefMode",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Boolean)
            },
        )
        .with_dlg_form("/builder")
}

/// Simple unique-keyed entity
pub fn role_entity() -> Entity {
    Entity::new("Role")
        .with_namespace("sys")
        .with_object_title("$name")
        .with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String).unique().required(),
        )
        .with_attribute(
            "code",
            AttrTypeDef::of_type(SimpleAttrType::String).unique().required(),
        )
        .with_attribute("description", SimpleAttrType::String)
}

/// Users with role references, an enum state and nullable attributes
pub fn user_entity() -> Entity {
    Entity::new("User")
        .with_namespace("sys")
        .with_object_title("$name")
        .with_attribute(
            "name",
            AttrTypeDef {
                max: Some(40.0),
                ..AttrTypeDef::of_type(SimpleAttrType::String).required()
            },
        )
        .with_attribute(
            "email",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .unique()
                .with_match(EMAIL_PATTERN),
        )
        .with_attribute(
            "password",
            AttrTypeDef {
                minlength: Some(8),
                ..AttrTypeDef::of_type(SimpleAttrType::String).required().hidden()
            },
        )
        .with_attribute(
            "roles",
            AttrTypeDef::of_type(SimpleAttrType::Array)
                .with_of(OfTag::ObjectId)
                .references("Role")
                .with_displayed_fields([DisplayedField::new("name").readonly()])
                .required(),
        )
        .with_attribute(
            "state",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .with_enum(["unconfirmed", "active", "uninitialized", "disabled"]),
        )
        .with_attribute(
            "verificationCode",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String).nullable()
            },
        )
        .with_attribute(
            "verificationCodeExpiresAt",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Timestamp).nullable()
            },
        )
        .with_attribute(
            "verificationLinkToken",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String).nullable()
            },
        )
        .with_attribute(
            "verificationLinkExpiresAt",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Timestamp).nullable()
            },
        )
}

/// Infrastructure entity with many unique keys and reference arrays
pub fn workspace_entity() -> Entity {
    Entity::new("Workspace")
        .with_namespace("sys")
        .with_object_title("$name")
        .with_attribute(
            "domain",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String).unique()
            },
        )
        .with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with_attribute("beHost", SimpleAttrType::String)
        .with_attribute(
            "beContainerId",
            AttrTypeDef::of_type(SimpleAttrType::String).unique(),
        )
        .with_attribute(
            "beURI",
            AttrTypeDef::of_type(SimpleAttrType::String).unique(),
        )
        .with_attribute(
            "dbHost",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with_attribute(
            "dbContainerId",
            AttrTypeDef::of_type(SimpleAttrType::String).unique(),
        )
        .with_attribute(
            "dbURI",
            AttrTypeDef::of_type(SimpleAttrType::String).unique(),
        )
        .with_attribute("dbName", SimpleAttrType::String)
        .with_attribute(
            "state",
            AttrTypeDef::of_type(SimpleAttrType::Enum)
                .with_enum(["initializing", "active", "disabled", "deleting"])
                .required(),
        )
        .with_attribute(
            "ownerUserId",
            AttrTypeDef::of_type(SimpleAttrType::ObjectId)
                .references("User")
                .with_displayed_fields([DisplayedField::new("name").readonly()])
                .required(),
        )
        .with_attribute(
            "organizationsId",
            AttrTypeDef::of_type(SimpleAttrType::Array)
                .with_of(OfTag::ObjectId)
                .references("Company")
                .with_displayed_fields([DisplayedField::new("name").readonly()])
                .required(),
        )
        .with_attribute("dbPort", SimpleAttrType::Number)
        .with_attribute("bePort", SimpleAttrType::Number)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ermeta_core::Validatable;

    #[test]
    fn test_all_fixtures_validate() {
        for entity in system_entities() {
            assert!(
                entity.validate().is_ok(),
                "fixture {} failed validation: {:?}",
                entity.name,
                entity.validate()
            );
        }
    }

    #[test]
    fn test_fixture_names_are_unique() {
        let mut names: Vec<String> = system_entities().iter().map(|e| e.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), system_entities().len());
    }
}
