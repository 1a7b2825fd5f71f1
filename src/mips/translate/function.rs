//! Function prologue/epilogue, parameter passing and call sequences.

use crate::mips::calling_convention::{
    self, create_calling_context, sanitize_function_name,
};
use crate::mips::frame::{ActivationRecord, ActivationRecordBuilder};
use crate::mips::generator::MipsGenerator;
use crate::mips::instruction::MipsNode;
use crate::mips::registers::{ARGUMENT_REGISTERS, SAVED_REGISTERS};
use crate::mips::translate::{is_constant, is_data_label};
use crate::mips::MipsError;
use crate::tac::address::MemoryLocation;

impl MipsGenerator {
    /// `BeginFunc`: build (or reuse) the activation record, reset the
    /// allocator for the new scope, pre-register parameter homes, define
    /// the entry label and emit the prologue. `spill_estimate` comes from a
    /// scan of the function's TAC and sizes the spill area.
    pub(crate) fn translate_begin_func(
        &mut self,
        name: &str,
        param_count: usize,
        frame_size_hint: u32,
        param_names: &[String],
        spill_estimate: u32,
    ) -> Result<(), MipsError> {
        self.emit_comment(format!("Function: {name} (params: {param_count})"));
        let function = sanitize_function_name(name);
        self.current_function = Some(function.clone());
        self.entry_label = Some(function.clone());

        if self.frames.record(&function).is_none() {
            let param_area = (param_count.min(4) as u32) * 4;
            let spill_area = frame_size_hint
                .max(spill_estimate)
                .max(param_area + 16);
            let record = ActivationRecordBuilder::new(&function, param_count)
                .saved_registers(&SAVED_REGISTERS)
                .spill_area_size(spill_area)
                .build();
            self.frames.register_function(record);
        }
        let record = self
            .frames
            .enter_function(&function)
            .expect("record registered above")
            .clone();

        // Fresh register state; parameters become memory-resident at
        // i*4($fp) so the allocator reloads them on demand.
        self.allocator.reset();
        self.allocator
            .reserve_spill_region((param_count.min(4) as i32) * 4);
        let named = |index: usize| {
            param_names
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("param{index}"))
        };
        for index in 0..param_count {
            let offset = if index < 4 {
                index as i32 * 4
            } else {
                record.frame_size as i32 + (index as i32 - 4) * 4
            };
            self.allocator
                .bind_memory(&named(index), MemoryLocation::frame(offset, 4, false));
        }

        self.emit_label(&function)?;
        self.emit_prologue(&record, param_names);
        Ok(())
    }

    fn emit_prologue(&mut self, record: &ActivationRecord, param_names: &[String]) {
        let frame_size = record.frame_size as i32;
        self.emit_text(
            MipsNode::ins("addi", &["$sp", "$sp", &(-frame_size).to_string()])
                .with_comment(format!("allocate frame ({frame_size} bytes)")),
        );
        let ra_offset = frame_size + record.return_address_offset;
        self.emit_text(
            MipsNode::ins("sw", &["$ra", &format!("{ra_offset}($sp)")])
                .with_comment("save return address"),
        );
        let fp_offset = frame_size + record.old_fp_offset;
        self.emit_text(
            MipsNode::ins("sw", &["$fp", &format!("{fp_offset}($sp)")])
                .with_comment("save frame pointer"),
        );
        for (index, register) in record.saved_registers.iter().enumerate() {
            let offset = fp_offset - 4 * (index as i32 + 1);
            self.emit_text(
                MipsNode::ins("sw", &[register, &format!("{offset}($sp)")])
                    .with_comment(format!("save {register}")),
            );
        }
        self.emit_text(MipsNode::ins("move", &["$fp", "$sp"]).with_comment("set frame pointer"));

        for index in 0..record.param_count.min(4) {
            let name = param_names
                .get(index)
                .map(String::as_str)
                .unwrap_or("param");
            let offset = index * 4;
            self.emit_text(
                MipsNode::ins(
                    "sw",
                    &[ARGUMENT_REGISTERS[index], &format!("{offset}($sp)")],
                )
                .with_comment(format!(
                    "save parameter '{name}' from {}",
                    ARGUMENT_REGISTERS[index]
                )),
            );
        }
    }

    pub(crate) fn translate_end_func(&mut self, name: &str) -> Result<(), MipsError> {
        let record = self
            .frames
            .current_record()
            .cloned()
            .ok_or_else(|| MipsError::UnmatchedEndFunc(name.to_string()))?;
        self.emit_comment(format!("End function: {name}"));
        self.emit_epilogue(&record);
        self.frames.exit_function();
        self.allocator.reset();
        self.current_function = None;
        self.entry_label = None;
        Ok(())
    }

    fn emit_epilogue(&mut self, record: &ActivationRecord) {
        let frame_size = record.frame_size as i32;
        let fp_offset = frame_size + record.old_fp_offset;
        for (index, register) in record.saved_registers.iter().enumerate() {
            let offset = fp_offset - 4 * (index as i32 + 1);
            self.emit_text(
                MipsNode::ins("lw", &[register, &format!("{offset}($sp)")])
                    .with_comment(format!("restore {register}")),
            );
        }
        self.emit_text(
            MipsNode::ins("lw", &["$fp", &format!("{fp_offset}($sp)")])
                .with_comment("restore frame pointer"),
        );
        let ra_offset = frame_size + record.return_address_offset;
        self.emit_text(
            MipsNode::ins("lw", &["$ra", &format!("{ra_offset}($sp)")])
                .with_comment("restore return address"),
        );
        self.emit_text(
            MipsNode::ins("addi", &["$sp", "$sp", &frame_size.to_string()])
                .with_comment("deallocate frame"),
        );
        self.emit_text(MipsNode::ins("jr", &["$ra"]).with_comment("return"));
    }

    pub(crate) fn translate_push_param(&mut self, value: &str) {
        self.pending_params.push(value.to_string());
    }

    /// The full call sequence: flush caller-saved state, place the queued
    /// parameters by index, `jal`, forget clobbered registers, then fetch
    /// the result out of `$v0`.
    pub(crate) fn translate_call(
        &mut self,
        function: &str,
        param_count: usize,
        target: Option<&str>,
    ) -> Result<(), MipsError> {
        self.emit_comment(format!("Call {function} with {param_count} params"));
        let callee = sanitize_function_name(function);
        let context = create_calling_context(&callee, param_count, target.is_some());

        if self.pending_params.len() != param_count {
            return Err(MipsError::ParameterMismatch {
                function: callee,
                expected: param_count,
                got: self.pending_params.len(),
            });
        }

        let spills = self.allocator.spill_caller_saved();
        if !spills.is_empty() {
            self.emit_comment("Save caller-saved registers");
            self.materialise_spills(&spills);
        }

        // Resolve every variable operand while $sp still points at the
        // frame base: spill-slot loads are $sp-relative and must not see
        // the outgoing-parameter adjustment below.
        let pending = std::mem::take(&mut self.pending_params);
        let mut resolved: Vec<Option<String>> = Vec::with_capacity(pending.len());
        let mut reserved: Vec<String> = Vec::new();
        for (index, value) in pending.iter().enumerate() {
            let needs_register =
                index >= 4 || !(is_constant(value) || value.starts_with('"') || is_data_label(value));
            if needs_register {
                let register = self.load_operand(value, &reserved)?;
                reserved.push(register.clone());
                resolved.push(Some(register));
            } else {
                resolved.push(None);
            }
        }

        if context.stack_space_needed > 0 {
            self.emit_text(
                MipsNode::ins(
                    "addi",
                    &["$sp", "$sp", &(-context.stack_space_needed).to_string()],
                )
                .with_comment("allocate stack params"),
            );
        }

        for (index, value) in pending.iter().enumerate() {
            let location = &context.param_locations[index];
            match location.register {
                Some(register) => match &resolved[index] {
                    Some(source) => self.emit_text(
                        MipsNode::ins("move", &[register, source])
                            .with_comment(format!("param {index}")),
                    ),
                    None => self.place_register_param(value, register, index)?,
                },
                None => {
                    let offset = location.stack_offset.unwrap_or(0);
                    let source = resolved[index].clone().expect("stack params are resolved");
                    self.emit_text(
                        MipsNode::ins("sw", &[&source, &format!("{offset}($sp)")])
                            .with_comment(format!("push param {index}")),
                    );
                }
            }
        }

        self.labels.reference_label(&callee);
        self.emit_text(MipsNode::ins("jal", &[&callee]).with_comment(format!("call {callee}")));

        self.allocator.invalidate_caller_saved();

        if let Some(target) = target {
            let dest = self.acquire(target, true, &[])?;
            if dest != "$v0" {
                self.emit_text(
                    MipsNode::ins("move", &[&dest, "$v0"]).with_comment("get return value"),
                );
            }
        }
        Ok(())
    }

    fn place_register_param(
        &mut self,
        value: &str,
        register: &str,
        index: usize,
    ) -> Result<(), MipsError> {
        let comment = format!("param {index}");
        if is_constant(value) {
            self.emit_text(MipsNode::ins("li", &[register, value]).with_comment(comment));
            return Ok(());
        }
        if value.starts_with('"') {
            let label = self.data.add_string_literal(value);
            self.emit_text(MipsNode::ins("la", &[register, &label]).with_comment(comment));
            return Ok(());
        }
        if is_data_label(value) {
            self.emit_text(MipsNode::ins("la", &[register, value]).with_comment(comment));
            return Ok(());
        }
        let source = self.load_operand(value, &[])?;
        self.emit_text(MipsNode::ins("move", &[register, &source]).with_comment(comment));
        Ok(())
    }

    /// `return x`: value into `$v0`, then an inline epilogue so every
    /// return site leaves the frame correctly.
    pub(crate) fn translate_return(&mut self, value: Option<&str>) -> Result<(), MipsError> {
        self.emit_comment("Return statement");
        if let Some(value) = value {
            if is_constant(value) {
                self.emit_text(
                    MipsNode::ins("li", &["$v0", value]).with_comment("return literal value"),
                );
            } else if value.starts_with('"') {
                let label = self.data.add_string_literal(value);
                self.emit_text(
                    MipsNode::ins("la", &["$v0", &label]).with_comment("return string literal"),
                );
            } else if is_data_label(value) {
                self.emit_text(
                    MipsNode::ins("la", &["$v0", value]).with_comment("return data label"),
                );
            } else {
                let register = self.load_operand(value, &[])?;
                if register != "$v0" {
                    self.emit_text(
                        MipsNode::ins("move", &["$v0", &register])
                            .with_comment("set return value"),
                    );
                }
            }
        }

        if let Some(record) = self.frames.current_record().cloned() {
            self.emit_epilogue(&record);
        }
        Ok(())
    }

    pub(crate) fn translate_pop_params(&mut self, count: usize) {
        if let Some(node) = calling_convention::pop_params(count) {
            self.emit_comment(format!("Clean up {count} params"));
            self.emit_text(node);
        }
    }
}
