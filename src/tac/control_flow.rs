//! Statement and control-flow lowering: loops, branches, switch and the
//! break/continue plumbing through the label manager's context stack.

use crate::ast::tree::{Block, Expr, ExprData, Stmt, StmtData};
use crate::tac::generator::ProgramTacGenerator;
use crate::tac::instruction::{Operator, TacInstruction};
use crate::tac::TacError;

impl ProgramTacGenerator {
    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), TacError> {
        match &stmt.data {
            StmtData::Expression(expr) => {
                if matches!(expr.data, ExprData::Call { .. }) {
                    self.lower_call(expr)?;
                } else {
                    self.lower_expr(expr)?;
                }
                Ok(())
            }
            StmtData::VarDecl {
                name, initializer, ..
            } => self.lower_var_decl(name, initializer.as_ref()),
            StmtData::Assignment { target, value } => {
                self.lower_assignment(target, value)?;
                Ok(())
            }
            StmtData::Block(block) => self.lower_block(block),
            StmtData::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(condition, then_branch, else_branch.as_ref()),
            StmtData::While { condition, body } => self.lower_while(condition, body),
            StmtData::DoWhile { body, condition } => self.lower_do_while(body, condition),
            StmtData::For {
                init,
                condition,
                update,
                body,
            } => self.lower_for(init.as_deref(), condition.as_ref(), update.as_deref(), body),
            StmtData::Foreach {
                var_name,
                iterable,
                body,
            } => self.lower_foreach(var_name, iterable, body),
            StmtData::Switch {
                expression,
                cases,
                default,
            } => self.lower_switch(expression, cases, default.as_deref()),
            StmtData::Break => {
                let label = self
                    .labels
                    .current_break_label()
                    .map(str::to_string)
                    .ok_or(TacError::BreakOutsideLoop { loc: stmt.loc })?;
                self.emit(TacInstruction::Goto { label });
                Ok(())
            }
            StmtData::Continue => {
                let label = self
                    .labels
                    .current_continue_label()
                    .map(str::to_string)
                    .ok_or(TacError::ContinueOutsideLoop { loc: stmt.loc })?;
                self.emit(TacInstruction::Goto { label });
                Ok(())
            }
            StmtData::Return(value) => self.lower_return(value.as_ref()),
            StmtData::TryCatch {
                try_block,
                exc_name,
                catch_block: _,
            } => {
                // No unwinding exists in the runtime model; the catch arm can
                // never be reached.
                self.emit(TacInstruction::comment("try block"));
                self.lower_block(try_block)?;
                self.emit(TacInstruction::comment(format!(
                    "catch {exc_name} elided (no runtime unwinding)"
                )));
                Ok(())
            }
            StmtData::Function(decl) => self.lower_function(decl),
            StmtData::Class(decl) => self.lower_class(decl),
        }
    }

    pub fn lower_block(&mut self, block: &Block) -> Result<(), TacError> {
        self.temps.enter_scope();
        let result = block
            .statements
            .iter()
            .try_for_each(|stmt| self.lower_stmt(stmt));
        self.temps.exit_scope();
        result
    }

    fn lower_var_decl(&mut self, name: &str, initializer: Option<&Expr>) -> Result<(), TacError> {
        if self.addresses.current_function().is_some() {
            self.addresses.allocate_local(name, 4);
        } else {
            self.addresses.allocate_global(name, 4);
        }
        match initializer {
            Some(initializer) => {
                let value = self.lower_expr(initializer)?;
                self.emit(TacInstruction::simple_assign(name, value));
            }
            None => {
                self.emit(TacInstruction::comment(format!(
                    "Variable declaration: {name}"
                )));
            }
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        condition: &Expr,
        then_branch: &Block,
        else_branch: Option<&Block>,
    ) -> Result<(), TacError> {
        let false_label = self.new_label("if_false");
        let condition_result = self.lower_expr(condition)?;
        self.emit(TacInstruction::IfGoto {
            condition: condition_result,
            operator: Some(Operator::Eq),
            operand2: Some("0".to_string()),
            label: false_label.clone(),
        });

        self.lower_block(then_branch)?;

        match else_branch {
            Some(else_branch) => {
                // When the then branch statically exits there is nothing to
                // jump over, so the end label is elided.
                let then_exits = block_has_exit(then_branch);
                let end_label = if then_exits {
                    None
                } else {
                    let end_label = self.new_label("if_end");
                    self.emit(TacInstruction::Goto {
                        label: end_label.clone(),
                    });
                    Some(end_label)
                };
                self.emit(TacInstruction::Label { name: false_label });
                self.lower_block(else_branch)?;
                if let Some(end_label) = end_label {
                    self.emit(TacInstruction::Label { name: end_label });
                }
            }
            None => {
                self.emit(TacInstruction::Label { name: false_label });
            }
        }
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expr, body: &Block) -> Result<(), TacError> {
        let start_label = self.new_label("while_start");
        let end_label = self.new_label("while_end");

        self.emit(TacInstruction::Label {
            name: start_label.clone(),
        });
        let condition_result = self.lower_expr(condition)?;
        self.emit(TacInstruction::IfGoto {
            condition: condition_result,
            operator: Some(Operator::Eq),
            operand2: Some("0".to_string()),
            label: end_label.clone(),
        });

        self.labels.push_loop(&end_label, &start_label);
        let body_result = self.lower_block(body);
        self.labels.pop_loop()?;
        body_result?;

        self.emit(TacInstruction::Goto { label: start_label });
        self.emit(TacInstruction::Label { name: end_label });
        Ok(())
    }

    fn lower_do_while(&mut self, body: &Block, condition: &Expr) -> Result<(), TacError> {
        let start_label = self.new_label("do_start");
        let cond_label = self.new_label("do_cond");
        let end_label = self.new_label("do_end");

        self.emit(TacInstruction::Label {
            name: start_label.clone(),
        });

        self.labels.push_loop(&end_label, &cond_label);
        let body_result = self.lower_block(body);
        self.labels.pop_loop()?;
        body_result?;

        self.emit(TacInstruction::Label { name: cond_label });
        let condition_result = self.lower_expr(condition)?;
        self.emit(TacInstruction::IfGoto {
            condition: condition_result,
            operator: Some(Operator::Ne),
            operand2: Some("0".to_string()),
            label: start_label,
        });
        self.emit(TacInstruction::Label { name: end_label });
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        update: Option<&Stmt>,
        body: &Block,
    ) -> Result<(), TacError> {
        if let Some(init) = init {
            self.lower_stmt(init)?;
        }

        let condition_label = self.new_label("for_cond");
        let update_label = self.new_label("for_update");
        let end_label = self.new_label("for_end");

        self.emit(TacInstruction::Label {
            name: condition_label.clone(),
        });
        if let Some(condition) = condition {
            let condition_result = self.lower_expr(condition)?;
            self.emit(TacInstruction::IfGoto {
                condition: condition_result,
                operator: Some(Operator::Eq),
                operand2: Some("0".to_string()),
                label: end_label.clone(),
            });
        }

        self.labels.push_loop(&end_label, &update_label);
        let body_result = self.lower_block(body);
        self.labels.pop_loop()?;
        body_result?;

        self.emit(TacInstruction::Label { name: update_label });
        if let Some(update) = update {
            self.lower_stmt(update)?;
        }
        self.emit(TacInstruction::Goto {
            label: condition_label,
        });
        self.emit(TacInstruction::Label { name: end_label });
        Ok(())
    }

    fn lower_foreach(
        &mut self,
        var_name: &str,
        iterable: &Expr,
        body: &Block,
    ) -> Result<(), TacError> {
        let iterable_result = self.lower_expr(iterable)?;
        let index_temp = self.new_temp();
        let length_temp = self.new_temp();

        self.emit(TacInstruction::simple_assign(&index_temp, "0"));
        self.emit(TacInstruction::unary_assign(
            &length_temp,
            Operator::Len,
            &iterable_result,
        ));

        let loop_label = self.new_label("foreach_start");
        let continue_label = self.new_label("foreach_continue");
        let end_label = self.new_label("foreach_end");

        self.emit(TacInstruction::Label {
            name: loop_label.clone(),
        });
        self.emit(TacInstruction::IfGoto {
            condition: index_temp.clone(),
            operator: Some(Operator::Ge),
            operand2: Some(length_temp.clone()),
            label: end_label.clone(),
        });

        let element_temp = self.new_temp();
        self.emit(TacInstruction::ArrayAccess {
            target: element_temp.clone(),
            array: iterable_result,
            index: index_temp.clone(),
            is_assignment: false,
        });
        self.emit(TacInstruction::simple_assign(var_name, &element_temp));

        self.labels.push_loop(&end_label, &continue_label);
        let body_result = self.lower_block(body);
        self.labels.pop_loop()?;
        body_result?;

        self.emit(TacInstruction::Label {
            name: continue_label,
        });
        self.emit(TacInstruction::binary_assign(
            &index_temp,
            &index_temp,
            Operator::Add,
            "1",
        ));
        self.emit(TacInstruction::Goto { label: loop_label });
        self.emit(TacInstruction::Label { name: end_label });
        Ok(())
    }

    /// Cases fall through unless the source breaks, so the case bodies are
    /// emitted back to back after the dispatch chain.
    fn lower_switch(
        &mut self,
        expression: &Expr,
        cases: &[crate::ast::tree::SwitchCase],
        default: Option<&[Stmt]>,
    ) -> Result<(), TacError> {
        let scrutinee = self.lower_expr(expression)?;
        let end_label = self.new_label("switch_end");

        let case_labels: Vec<String> = cases.iter().map(|_| self.new_label("case")).collect();
        let default_label = if default.is_some() {
            self.new_label("switch_default")
        } else {
            end_label.clone()
        };

        for (case, label) in cases.iter().zip(&case_labels) {
            let case_value = self.lower_expr(&case.expression)?;
            self.emit(TacInstruction::IfGoto {
                condition: scrutinee.clone(),
                operator: Some(Operator::Eq),
                operand2: Some(case_value),
                label: label.clone(),
            });
        }
        self.emit(TacInstruction::Goto {
            label: default_label.clone(),
        });

        self.labels.push_switch(&end_label);
        let body_result = self.lower_switch_bodies(cases, &case_labels, default, &default_label);
        self.labels.pop_switch()?;
        body_result?;

        self.emit(TacInstruction::Label { name: end_label });
        Ok(())
    }

    fn lower_switch_bodies(
        &mut self,
        cases: &[crate::ast::tree::SwitchCase],
        case_labels: &[String],
        default: Option<&[Stmt]>,
        default_label: &str,
    ) -> Result<(), TacError> {
        for (case, label) in cases.iter().zip(case_labels) {
            self.emit(TacInstruction::Label {
                name: label.clone(),
            });
            for stmt in &case.statements {
                self.lower_stmt(stmt)?;
            }
        }
        if let Some(default) = default {
            self.emit(TacInstruction::Label {
                name: default_label.to_string(),
            });
            for stmt in default {
                self.lower_stmt(stmt)?;
            }
        }
        Ok(())
    }

    fn lower_return(&mut self, value: Option<&Expr>) -> Result<(), TacError> {
        match value {
            Some(value) => {
                let result = self.lower_expr(value)?;
                self.emit(TacInstruction::Return {
                    value: Some(result.clone()),
                });
                self.release_if_temp(&result);
            }
            None => {
                self.emit(TacInstruction::Return { value: None });
            }
        }
        Ok(())
    }
}

/// Whether a statement statically leaves its enclosing region (return,
/// break or continue at the tail).
pub(crate) fn stmt_has_exit(stmt: &Stmt) -> bool {
    match &stmt.data {
        StmtData::Return(_) | StmtData::Break | StmtData::Continue => true,
        StmtData::Block(block) => block_has_exit(block),
        _ => false,
    }
}

pub(crate) fn block_has_exit(block: &Block) -> bool {
    block.statements.last().is_some_and(stmt_has_exit)
}
