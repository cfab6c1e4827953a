use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepcovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read archive {path}: {source}")]
    Archive {
        path: String,
        source: zip::result::ZipError,
    },

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Malformed manifest: '{child}' declares parent '{parent}', which is not in the dependency graph")]
    DanglingParent { child: String, parent: String },

    #[error("Malformed manifest: linking '{child}' under '{parent}' would create a dependency cycle")]
    DependencyCycle { parent: String, child: String },

    #[error("Package '{package}' matches both the project and dependency '{dependency}'")]
    PackageCollision { package: String, dependency: String },

    #[error("Failed to emit coverage view for {path}: {message}")]
    Emit { path: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage report format")]
    UnknownFormat,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DepcovError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_names_both_sides() {
        let err = DepcovError::PackageCollision {
            package: "com.example.util".to_string(),
            dependency: "org.acme:acme-core:1.2.0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("com.example.util"));
        assert!(msg.contains("org.acme:acme-core:1.2.0"));
    }

    #[test]
    fn test_dangling_parent_message() {
        let err = DepcovError::DanglingParent {
            child: "g:c:1".to_string(),
            parent: "g:missing:1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed manifest: 'g:c:1' declares parent 'g:missing:1', which is not in the dependency graph"
        );
    }
}
