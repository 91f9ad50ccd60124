//! # Wire Primitives
//!
//! Fixed names and limits of the TwoA document format.
//!
//! These constants are compiled into the binary and are immutable at runtime.
//! Both the encoder and the decoder read element and attribute names from here,
//! so the two directions cannot drift apart.

// =============================================================================
// NAMESPACES
// =============================================================================

/// Primary namespace. Every domain element lives here.
pub const TWOA_NAMESPACE: &str = "http://www.w3.org/twoa";

/// Schema namespace qualifying the defining and referencing attributes.
pub const SCHEMA_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Prefix bound to [`SCHEMA_NAMESPACE`] on the root element.
pub const SCHEMA_PREFIX: &str = "xsd";

// =============================================================================
// ELEMENT NAMES
// =============================================================================

pub const TWOA_ELEM: &str = "TwoA";
pub const PCATEGORIES_ELEM: &str = "PCategories";
pub const PCATEGORY_ELEM: &str = "PCategory";
pub const RATING_ELEM: &str = "Rating";
pub const RANKORDER_ELEM: &str = "RankOrder";
pub const PARAMS_ELEM: &str = "Params";
pub const THRESHOLD_ELEM: &str = "Threshold";
pub const RANKS_ELEM: &str = "Ranks";
pub const RANK_ELEM: &str = "Rank";
pub const KSTRUCTURE_ELEM: &str = "KStructure";
pub const KSRANK_ELEM: &str = "KSRank";
pub const KSTATE_ELEM: &str = "KState";
pub const PREVIOUS_STATES_ELEM: &str = "PreviousStates";
pub const NEXT_STATES_ELEM: &str = "NextStates";

// =============================================================================
// ATTRIBUTE NAMES
// =============================================================================

/// Defining identifier (schema namespace). Appears once per category or state.
pub const ID_ATTR: &str = "id";

/// Referencing identifier (schema namespace). Points at a defining identifier.
pub const IDREF_ATTR: &str = "idref";

/// Rank index attribute on `Rank` and `KSRank` (no namespace).
pub const INDEX_ATTR: &str = "Index";

/// State type attribute on `KState` (no namespace).
pub const TYPE_ATTR: &str = "Type";

// =============================================================================
// STRUCTURE
// =============================================================================

/// Index of the knowledge rank holding the single root state.
pub const ROOT_RANK_INDEX: i32 = 0;

// =============================================================================
// INPUT LIMITS
// =============================================================================

/// Default upper bound on a text payload accepted by the decoder.
///
/// Checked before the payload is handed to the XML reader.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

/// Default indentation width used when rendering a document.
pub const DEFAULT_INDENT: usize = 2;
