//! # Document Primitives
//!
//! Fixed vocabulary and limits of the role document format.
//!
//! ```xml
//! <roles>
//!   <group name="admins"/>
//!   <user name="alice">
//!     <properties>
//!       <email>alice@example.com</email>
//!       <avatar type="byte[]">...</avatar>
//!     </properties>
//!     <credentials>
//!       <password>secret</password>
//!     </credentials>
//!     <memberof>admins</memberof>
//!   </user>
//! </roles>
//! ```

/// Attribute carrying the role name on `user`/`group` elements.
pub const NAME_ATTRIBUTE: &str = "name";

/// Attribute marking a property or credential value's encoding.
pub const TYPE_ATTRIBUTE: &str = "type";

/// `type` attribute value that marks a value as binary.
pub const BINARY_TYPE: &str = "byte[]";

/// Role child holding property elements.
pub const PROPERTIES_ELEMENT: &str = "properties";

/// Role child holding credential elements.
pub const CREDENTIALS_ELEMENT: &str = "credentials";

/// Role child naming one group the role belongs to.
pub const MEMBEROF_ELEMENT: &str = "memberof";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a role document (16 MB).
///
/// Larger inputs are rejected by the parser before any markup is read.
pub const MAX_DOCUMENT_BYTES: u64 = 16 * 1024 * 1024;

/// Maximum element nesting depth inside a role document.
pub const MAX_ELEMENT_DEPTH: usize = 64;
