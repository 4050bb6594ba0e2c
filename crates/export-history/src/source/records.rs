//! Typed component records extracted from a parsed project export.
//!
//! One struct per mapped entity kind. The parsing collaborator produces
//! these; the import layer only reads them.

use serde::{Deserialize, Serialize};

/// The controller itself: one per export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerRecord {
    pub name: String,
    pub processor_type: String,
    pub firmware_major: i32,
    pub firmware_minor: i32,
    pub comment: Option<String>,
}

/// An I/O or communication module in the chassis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub catalog_number: String,
    pub vendor_id: i32,
    pub product_code: i32,
    /// Chassis slot; absent for network-attached modules.
    pub slot: Option<u8>,
    pub comment: Option<String>,
}

/// A user-defined data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTypeRecord {
    pub name: String,
    pub family: String,
    pub size_bytes: i32,
    pub comment: Option<String>,
}

/// A program container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub name: String,
    pub main_routine: Option<String>,
    pub disabled: bool,
    pub comment: Option<String>,
}

/// A routine within a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineRecord {
    pub program_name: String,
    pub name: String,
    pub routine_type: String,
    pub comment: Option<String>,
}

/// A tag, either controller-scoped or program-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    /// `"controller"` or the owning program's name.
    pub scope: String,
    pub name: String,
    pub data_type: String,
    pub dimensions: Option<String>,
    pub radix: Option<String>,
    pub constant: bool,
    pub comment: Option<String>,
}

/// One rung of ladder logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RungRecord {
    pub program_name: String,
    pub routine_name: String,
    pub number: i32,
    pub rung_type: String,
    pub text: String,
    pub comment: Option<String>,
}
