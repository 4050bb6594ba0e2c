//! Table mappings and the standard processor registry.
//!
//! Registration order is the import dependency order: the snapshot-level
//! controller record first, then structural/definitional kinds, then the
//! reference kinds that point back at them (tags before the rungs that use
//! them). The facade runs processors strictly in this order.

use std::sync::Arc;

use crate::config::WriteStrategyKind;
use crate::core::mapping::{ColumnMapping, TableMapping};
use crate::core::value::StorageType;
use crate::source::{
    ControllerRecord, DataTypeRecord, ModuleRecord, ProgramRecord, ProjectExport, RoutineRecord,
    RungRecord, TagRecord,
};

use super::strategy::{BulkCopy, StreamedInsert, WriteStrategy};
use super::{ImportProcessor, MappedProcessor};

pub fn controller_mapping() -> TableMapping<ControllerRecord> {
    TableMapping::new(
        "controller",
        vec![
            ColumnMapping::new("name", StorageType::Text, |r: &ControllerRecord| {
                Some(r.name.clone().into())
            }),
            ColumnMapping::new("processor_type", StorageType::Text, |r: &ControllerRecord| {
                Some(r.processor_type.clone().into())
            }),
            ColumnMapping::new("firmware_major", StorageType::Int32, |r: &ControllerRecord| {
                Some(r.firmware_major.into())
            }),
            ColumnMapping::new("firmware_minor", StorageType::Int32, |r: &ControllerRecord| {
                Some(r.firmware_minor.into())
            }),
            ColumnMapping::new("comment", StorageType::Text, |r: &ControllerRecord| {
                r.comment.clone().map(Into::into)
            }),
        ],
    )
}

pub fn module_mapping() -> TableMapping<ModuleRecord> {
    TableMapping::new(
        "module",
        vec![
            ColumnMapping::new("name", StorageType::Text, |r: &ModuleRecord| {
                Some(r.name.clone().into())
            }),
            ColumnMapping::new("catalog_number", StorageType::Text, |r: &ModuleRecord| {
                Some(r.catalog_number.clone().into())
            }),
            ColumnMapping::new("vendor_id", StorageType::Int32, |r: &ModuleRecord| {
                Some(r.vendor_id.into())
            }),
            ColumnMapping::new("product_code", StorageType::Int32, |r: &ModuleRecord| {
                Some(r.product_code.into())
            }),
            ColumnMapping::new("slot", StorageType::Byte, |r: &ModuleRecord| {
                r.slot.map(Into::into)
            }),
            ColumnMapping::new("comment", StorageType::Text, |r: &ModuleRecord| {
                r.comment.clone().map(Into::into)
            }),
        ],
    )
}

pub fn data_type_mapping() -> TableMapping<DataTypeRecord> {
    TableMapping::new(
        "data_type",
        vec![
            ColumnMapping::new("name", StorageType::Text, |r: &DataTypeRecord| {
                Some(r.name.clone().into())
            }),
            ColumnMapping::new("family", StorageType::Text, |r: &DataTypeRecord| {
                Some(r.family.clone().into())
            }),
            ColumnMapping::new("size_bytes", StorageType::Int32, |r: &DataTypeRecord| {
                Some(r.size_bytes.into())
            }),
            ColumnMapping::new("comment", StorageType::Text, |r: &DataTypeRecord| {
                r.comment.clone().map(Into::into)
            }),
        ],
    )
}

pub fn program_mapping() -> TableMapping<ProgramRecord> {
    TableMapping::new(
        "program",
        vec![
            ColumnMapping::new("name", StorageType::Text, |r: &ProgramRecord| {
                Some(r.name.clone().into())
            }),
            ColumnMapping::new("main_routine", StorageType::Text, |r: &ProgramRecord| {
                r.main_routine.clone().map(Into::into)
            }),
            ColumnMapping::new("disabled", StorageType::Boolean, |r: &ProgramRecord| {
                Some(r.disabled.into())
            }),
            ColumnMapping::new("comment", StorageType::Text, |r: &ProgramRecord| {
                r.comment.clone().map(Into::into)
            }),
        ],
    )
}

pub fn routine_mapping() -> TableMapping<RoutineRecord> {
    TableMapping::new(
        "routine",
        vec![
            ColumnMapping::new("program_name", StorageType::Text, |r: &RoutineRecord| {
                Some(r.program_name.clone().into())
            }),
            ColumnMapping::new("name", StorageType::Text, |r: &RoutineRecord| {
                Some(r.name.clone().into())
            }),
            ColumnMapping::new("routine_type", StorageType::Text, |r: &RoutineRecord| {
                Some(r.routine_type.clone().into())
            }),
            ColumnMapping::new("comment", StorageType::Text, |r: &RoutineRecord| {
                r.comment.clone().map(Into::into)
            }),
        ],
    )
}

pub fn tag_mapping() -> TableMapping<TagRecord> {
    TableMapping::new(
        "tag",
        vec![
            ColumnMapping::new("scope", StorageType::Text, |r: &TagRecord| {
                Some(r.scope.clone().into())
            }),
            ColumnMapping::new("name", StorageType::Text, |r: &TagRecord| {
                Some(r.name.clone().into())
            }),
            ColumnMapping::new("data_type", StorageType::Text, |r: &TagRecord| {
                Some(r.data_type.clone().into())
            }),
            ColumnMapping::new("dimensions", StorageType::Text, |r: &TagRecord| {
                r.dimensions.clone().map(Into::into)
            }),
            ColumnMapping::new("radix", StorageType::Text, |r: &TagRecord| {
                r.radix.clone().map(Into::into)
            }),
            ColumnMapping::new("constant", StorageType::Boolean, |r: &TagRecord| {
                Some(r.constant.into())
            }),
            ColumnMapping::new("comment", StorageType::Text, |r: &TagRecord| {
                r.comment.clone().map(Into::into)
            }),
        ],
    )
}

pub fn rung_mapping() -> TableMapping<RungRecord> {
    TableMapping::new(
        "rung",
        vec![
            ColumnMapping::new("program_name", StorageType::Text, |r: &RungRecord| {
                Some(r.program_name.clone().into())
            }),
            ColumnMapping::new("routine_name", StorageType::Text, |r: &RungRecord| {
                Some(r.routine_name.clone().into())
            }),
            ColumnMapping::new("number", StorageType::Int32, |r: &RungRecord| {
                Some(r.number.into())
            }),
            ColumnMapping::new("rung_type", StorageType::Text, |r: &RungRecord| {
                Some(r.rung_type.clone().into())
            }),
            ColumnMapping::new("text", StorageType::Text, |r: &RungRecord| {
                Some(r.text.clone().into())
            }),
            ColumnMapping::new("comment", StorageType::Text, |r: &RungRecord| {
                r.comment.clone().map(Into::into)
            }),
        ],
    )
}

/// Build the configured write strategy.
pub fn make_strategy(kind: WriteStrategyKind) -> Arc<dyn WriteStrategy> {
    match kind {
        WriteStrategyKind::Bulk => Arc::new(BulkCopy),
        WriteStrategyKind::Streamed => Arc::new(StreamedInsert),
    }
}

/// The standard processor set in import dependency order.
pub fn standard_processors(strategy: Arc<dyn WriteStrategy>) -> Vec<Box<dyn ImportProcessor>> {
    vec![
        Box::new(MappedProcessor::new(
            "controller",
            controller_mapping(),
            ProjectExport::controller_records,
            strategy.clone(),
        )),
        Box::new(MappedProcessor::new(
            "module",
            module_mapping(),
            ProjectExport::module_records,
            strategy.clone(),
        )),
        Box::new(MappedProcessor::new(
            "data_type",
            data_type_mapping(),
            ProjectExport::data_type_records,
            strategy.clone(),
        )),
        Box::new(MappedProcessor::new(
            "program",
            program_mapping(),
            ProjectExport::program_records,
            strategy.clone(),
        )),
        Box::new(MappedProcessor::new(
            "routine",
            routine_mapping(),
            ProjectExport::routine_records,
            strategy.clone(),
        )),
        Box::new(MappedProcessor::new(
            "tag",
            tag_mapping(),
            ProjectExport::tag_records,
            strategy.clone(),
        )),
        Box::new(MappedProcessor::new(
            "rung",
            rung_mapping(),
            ProjectExport::rung_records,
            strategy,
        )),
    ]
}
