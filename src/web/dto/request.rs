//! Request DTOs for Web API.

use serde::Deserialize;
use validator::Validate;

use super::validation::{no_control_chars, required_param};

/// Query for `GET /list`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `simple` or `flat` for a flat list, anything else for the tree.
    #[serde(default)]
    pub format: Option<String>,
}

impl ListQuery {
    /// Whether a flat list was requested.
    pub fn is_flat(&self) -> bool {
        matches!(self.format.as_deref(), Some("simple") | Some("flat"))
    }
}

/// Query naming one node, for `/delete`, `/download` and `/info`.
#[derive(Debug, Deserialize, Validate)]
pub struct NameQuery {
    #[validate(custom(function = "required_param"))]
    pub name: String,
}

/// Query naming a directory, for `/deletedir` and `/downloaddir`.
#[derive(Debug, Deserialize, Validate)]
pub struct DirNameQuery {
    #[validate(custom(function = "required_param"))]
    pub dirname: String,
}

/// Query for `POST /createdir`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDirQuery {
    #[validate(custom(function = "required_param"))]
    pub path: String,
}

/// Query for `PUT /rename`.
#[derive(Debug, Deserialize, Validate)]
pub struct RenameQuery {
    /// Current path of the node.
    #[serde(rename = "oldName")]
    #[validate(custom(function = "required_param"))]
    pub old_name: String,
    /// New last segment.
    #[serde(rename = "newName")]
    #[validate(custom(function = "required_param"))]
    pub new_name: String,
}

/// Query for `PUT /move`.
#[derive(Debug, Deserialize, Validate)]
pub struct MoveQuery {
    /// Current path of the node.
    #[validate(custom(function = "required_param"))]
    pub oldpath: String,
    /// Destination directory; empty or absent means the root.
    #[serde(default)]
    #[validate(custom(function = "no_control_chars"))]
    pub newparent: String,
}

/// Optional `meta` part of an upload.
#[derive(Debug, Default, Deserialize)]
pub struct UploadMeta {
    /// Overrides the multipart file name.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared size, checked against the content.
    #[serde(default)]
    pub size: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_format() {
        let flat = ListQuery {
            format: Some("simple".to_string()),
        };
        assert!(flat.is_flat());
        assert!(!ListQuery::default().is_flat());
        assert!(!ListQuery {
            format: Some("tree".to_string())
        }
        .is_flat());
    }

    #[test]
    fn test_name_query_validation() {
        assert!(NameQuery {
            name: "a/b.txt".to_string()
        }
        .validate()
        .is_ok());
        assert!(NameQuery {
            name: "  ".to_string()
        }
        .validate()
        .is_err());
        assert!(NameQuery {
            name: "a\u{0}b".to_string()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_rename_query_field_names() {
        let query: RenameQuery =
            serde_json::from_str(r#"{"oldName":"a/b.txt","newName":"c.txt"}"#).unwrap();
        assert_eq!(query.old_name, "a/b.txt");
        assert_eq!(query.new_name, "c.txt");
    }

    #[test]
    fn test_move_query_allows_root() {
        let query: MoveQuery = serde_json::from_str(r#"{"oldpath":"a/b"}"#).unwrap();
        assert_eq!(query.newparent, "");
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_upload_meta() {
        let meta: UploadMeta = serde_json::from_str(r#"{"name":"x.bin","size":3}"#).unwrap();
        assert_eq!(meta.name.as_deref(), Some("x.bin"));
        assert_eq!(meta.size, Some(3));
    }
}
