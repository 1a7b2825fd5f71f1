//! Object allocation and field access. Objects live on the heap with one
//! metadata word at offset 0 and fields at 4, 8, ... in declaration order.
//! There is no vtable; method calls were already lowered to plain calls
//! with `this` as the leading parameter.

use crate::mips::generator::MipsGenerator;
use crate::mips::instruction::MipsNode;
use crate::mips::MipsError;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct ClassLayout {
    pub class_name: String,
    pub properties: Vec<String>,
    pub property_offsets: IndexMap<String, i32>,
    pub total_size: u32,
}

impl ClassLayout {
    pub fn new(class_name: &str, properties: Vec<String>) -> Self {
        let mut property_offsets = IndexMap::new();
        // Offset 0 holds the class metadata word.
        let mut offset = 4;
        for property in &properties {
            property_offsets.insert(property.clone(), offset);
            offset += 4;
        }
        ClassLayout {
            class_name: class_name.to_string(),
            properties,
            property_offsets,
            total_size: offset as u32,
        }
    }

    pub fn property_offset(&self, property: &str) -> Option<i32> {
        self.property_offsets.get(property).copied()
    }
}

impl MipsGenerator {
    /// Make a class's field layout known before translating; `new` and
    /// property accesses fall back to defaults for unknown classes.
    pub fn register_class(&mut self, class_name: &str, properties: Vec<String>) {
        self.class_layouts.insert(
            class_name.to_string(),
            ClassLayout::new(class_name, properties),
        );
    }

    pub fn class_layout(&self, class_name: &str) -> Option<&ClassLayout> {
        self.class_layouts.get(class_name)
    }

    /// `target = new ClassName`: sbrk the object size, pointer into target.
    pub(crate) fn translate_new(
        &mut self,
        target: &str,
        class_name: &str,
    ) -> Result<(), MipsError> {
        self.emit_comment(format!("Allocate object: {class_name}"));
        let object_size = match self.class_layouts.get(class_name) {
            Some(layout) => layout.total_size,
            None => {
                self.emit_comment(format!(
                    "Warning: Unknown class {class_name}, using size 8"
                ));
                8
            }
        };

        let spills = self.allocator.spill_caller_saved();
        self.materialise_spills(&spills);
        self.emit_text(
            MipsNode::ins("li", &["$a0", &object_size.to_string()]).with_comment("object size"),
        );
        self.emit_text(MipsNode::ins("li", &["$v0", "9"]).with_comment("syscall: sbrk"));
        self.emit_text(MipsNode::ins("syscall", &[]).with_comment("allocate"));
        self.allocator.invalidate_caller_saved();

        let dest = self.acquire(target, true, &[])?;
        self.emit_text(
            MipsNode::ins("move", &[&dest, "$v0"]).with_comment("object pointer"),
        );
        Ok(())
    }

    /// Field reads and writes through the class layout. When the object's
    /// class is unknown the first layout defining the field wins, defaulting
    /// to the first field slot.
    pub(crate) fn translate_property_access(
        &mut self,
        target: &str,
        object: &str,
        property: &str,
        is_assignment: bool,
    ) -> Result<(), MipsError> {
        let offset = self
            .class_layouts
            .values()
            .find_map(|layout| layout.property_offset(property))
            .unwrap_or(4);

        let object_register = self.load_operand(object, &[])?;
        if is_assignment {
            self.emit_comment(format!("Write property: {object}.{property} = {target}"));
            let value = self.load_operand(target, &[object_register.clone()])?;
            self.emit_text(
                MipsNode::ins("sw", &[&value, &format!("{offset}({object_register})")])
                    .with_comment(format!("store {property}")),
            );
        } else {
            self.emit_comment(format!("Read property: {object}.{property}"));
            let dest = self.acquire(target, true, &[object_register.clone()])?;
            self.emit_text(
                MipsNode::ins("lw", &[&dest, &format!("{offset}({object_register})")])
                    .with_comment(format!("load {property}")),
            );
        }
        Ok(())
    }
}
