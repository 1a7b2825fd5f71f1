//! Function, method, constructor and call-site lowering, plus the
//! registration pre-pass that makes forward references and recursion work.

use crate::ast::tree::{
    Block, ClassDecl, ClassMember, Expr, ExprData, FunctionDecl, CONSTRUCTOR_NAME,
};
use crate::ast::types::TypeRef;
use crate::tac::builtins;
use crate::tac::control_flow::block_has_exit;
use crate::tac::generator::{ClassInfo, FunctionInfo, ProgramTacGenerator};
use crate::tac::instruction::{Operator, TacInstruction};
use crate::tac::TacError;
use log::debug;

/// How the synthesized trailing return of a function body is produced.
enum ImplicitReturn {
    /// `return <default>` for non-void, plain `return` for void.
    Default(Option<TypeRef>),
    /// Constructors return the instance.
    This,
}

impl ProgramTacGenerator {
    pub(crate) fn register_function(&mut self, decl: &FunctionDecl, class: Option<&str>) {
        match class {
            None => {
                let info = FunctionInfo {
                    name: decl.name.clone(),
                    parameters: decl.parameters.iter().map(|p| p.name.clone()).collect(),
                    return_type: decl.return_type.clone(),
                    is_method: false,
                };
                self.functions.entry(decl.name.clone()).or_insert(info);
            }
            Some(class_name) => {
                let mut parameters = vec!["this".to_string()];
                parameters.extend(decl.parameters.iter().map(|p| p.name.clone()));
                let (qualified, return_type) = if decl.name == CONSTRUCTOR_NAME {
                    (
                        format!("{class_name}_{CONSTRUCTOR_NAME}"),
                        Some(TypeRef::new(class_name, 0)),
                    )
                } else {
                    (
                        format!("{class_name}_{}", decl.name),
                        decl.return_type.clone(),
                    )
                };
                let info = FunctionInfo {
                    name: qualified.clone(),
                    parameters,
                    return_type,
                    is_method: true,
                };
                // Methods are reachable under the bare name too, so calls
                // inside the same class need no qualification.
                if decl.name != CONSTRUCTOR_NAME {
                    self.functions
                        .entry(decl.name.clone())
                        .or_insert_with(|| info.clone());
                }
                self.functions.entry(qualified).or_insert(info);
            }
        }
    }

    pub(crate) fn register_class_decl(&mut self, decl: &ClassDecl) {
        let info = ClassInfo {
            name: decl.name.clone(),
            superclass: decl.superclass.clone(),
            fields: decl.field_names(),
            has_explicit_constructor: decl.explicit_constructor().is_some(),
        };
        self.classes.entry(decl.name.clone()).or_insert(info);

        for member in &decl.members {
            if let ClassMember::Method(method) = member {
                self.register_function(method, Some(&decl.name));
            }
        }
        // A synthesized default constructor is registered like an explicit
        // one so call sites and the validator can resolve it.
        if decl.explicit_constructor().is_none() {
            let name = format!("{}_{CONSTRUCTOR_NAME}", decl.name);
            self.functions.entry(name.clone()).or_insert(FunctionInfo {
                name,
                parameters: vec!["this".to_string()],
                return_type: Some(TypeRef::new(&decl.name, 0)),
                is_method: true,
            });
        }
    }

    pub fn lower_function(&mut self, decl: &FunctionDecl) -> Result<(), TacError> {
        self.register_function(decl, None);
        let param_names: Vec<String> = decl.parameters.iter().map(|p| p.name.clone()).collect();
        self.emit_function_body(
            &decl.name.clone(),
            param_names,
            format!("Function: {}", decl.name),
            &decl.body,
            ImplicitReturn::Default(decl.return_type.clone()),
        )
    }

    pub fn lower_class(&mut self, decl: &ClassDecl) -> Result<(), TacError> {
        self.register_class_decl(decl);
        self.current_class = Some(decl.name.clone());

        self.emit(TacInstruction::comment(format!("Class: {}", decl.name)));
        if let Some(superclass) = &decl.superclass {
            self.emit(TacInstruction::comment(format!("Extends: {superclass}")));
        }

        let mut constructor_found = false;
        for member in &decl.members {
            match member {
                ClassMember::Field { name, .. } => {
                    self.emit(TacInstruction::comment(format!("Field: {name}")));
                }
                ClassMember::Method(method) if method.name == CONSTRUCTOR_NAME => {
                    constructor_found = true;
                    self.lower_constructor(method, &decl.name)?;
                }
                ClassMember::Method(method) => {
                    self.lower_method(method, &decl.name)?;
                }
            }
        }

        if !constructor_found {
            self.lower_default_constructor(&decl.name)?;
        }

        self.current_class = None;
        Ok(())
    }

    fn lower_constructor(
        &mut self,
        constructor: &FunctionDecl,
        class_name: &str,
    ) -> Result<(), TacError> {
        let name = format!("{class_name}_{CONSTRUCTOR_NAME}");
        let mut param_names = vec!["this".to_string()];
        param_names.extend(constructor.parameters.iter().map(|p| p.name.clone()));
        self.emit_function_body(
            &name,
            param_names,
            format!("Constructor: {class_name}"),
            &constructor.body,
            ImplicitReturn::This,
        )
    }

    fn lower_method(&mut self, method: &FunctionDecl, class_name: &str) -> Result<(), TacError> {
        let name = format!("{class_name}_{}", method.name);
        let mut param_names = vec!["this".to_string()];
        param_names.extend(method.parameters.iter().map(|p| p.name.clone()));
        self.emit_function_body(
            &name,
            param_names,
            format!("Method: {class_name}.{}", method.name),
            &method.body,
            ImplicitReturn::Default(method.return_type.clone()),
        )
    }

    fn lower_default_constructor(&mut self, class_name: &str) -> Result<(), TacError> {
        let name = format!("{class_name}_{CONSTRUCTOR_NAME}");
        self.emit_function_body(
            &name,
            vec!["this".to_string()],
            format!("Default Constructor: {class_name}"),
            &Block::default(),
            ImplicitReturn::This,
        )
    }

    /// Shared skeleton for functions, methods and constructors: activation
    /// frame, prologue comment, `BeginFunc`, the entry label (the function
    /// name itself), the body, a synthesized trailing return when the body
    /// does not end in one, and `EndFunc`. The frame size computed while
    /// lowering the body is patched back into `BeginFunc` afterwards.
    fn emit_function_body(
        &mut self,
        name: &str,
        param_names: Vec<String>,
        comment: String,
        body: &Block,
        implicit_return: ImplicitReturn,
    ) -> Result<(), TacError> {
        let previous_function = self.current_function.replace(name.to_string());
        self.addresses.enter_function(name, param_names.clone());
        self.temps.enter_scope();

        self.emit(TacInstruction::comment(comment));
        let begin_index = self.instructions.len();
        self.emit(TacInstruction::BeginFunc {
            name: name.to_string(),
            param_count: param_names.len(),
            frame_size: 0,
            param_names,
        });
        self.emit(TacInstruction::Label {
            name: name.to_string(),
        });

        let body_result = body
            .statements
            .iter()
            .try_for_each(|stmt| self.lower_stmt(stmt));

        if body_result.is_ok() && !block_has_exit(body) {
            match &implicit_return {
                ImplicitReturn::This => self.emit(TacInstruction::Return {
                    value: Some("this".to_string()),
                }),
                ImplicitReturn::Default(return_type) => {
                    let value = return_type
                        .as_ref()
                        .filter(|t| !t.is_void())
                        .map(|t| t.default_value().to_string());
                    self.emit(TacInstruction::Return { value });
                }
            }
        }

        self.emit(TacInstruction::EndFunc {
            name: name.to_string(),
        });

        self.temps.exit_scope();
        let frame_size = self
            .addresses
            .exit_function()
            .map(|frame| frame.total_size)
            .unwrap_or(0);
        if let TacInstruction::BeginFunc {
            frame_size: slot, ..
        } = &mut self.instructions[begin_index]
        {
            *slot = frame_size;
        }
        self.current_function = previous_function;
        body_result
    }

    /// Lower a call expression. Returns the operand holding the result, or
    /// `None` for void calls in statement position.
    pub fn lower_call(&mut self, expr: &Expr) -> Result<Option<String>, TacError> {
        let ExprData::Call { callee, arguments } = &expr.data else {
            return Err(TacError::UndeclaredFunction {
                name: "<expression>".to_string(),
                loc: expr.loc,
            });
        };

        match &callee.data {
            ExprData::Variable(name) => self.lower_named_call(name, arguments, expr),
            ExprData::Property { object, property } => {
                self.lower_method_call(object, property, arguments, expr)
            }
            _ => Err(TacError::UndeclaredFunction {
                name: "<expression>".to_string(),
                loc: expr.loc,
            }),
        }
    }

    fn lower_named_call(
        &mut self,
        name: &str,
        arguments: &[Expr],
        expr: &Expr,
    ) -> Result<Option<String>, TacError> {
        if let Some(info) = self.functions.get(name).cloned() {
            let this_operand = info.is_method.then(|| "this".to_string());
            return self.emit_call(&info.name, &info, this_operand, arguments, expr);
        }

        let Some(signature) = builtins::lookup(name) else {
            return Err(TacError::UndeclaredFunction {
                name: name.to_string(),
                loc: expr.loc,
            });
        };
        if arguments.len() != signature.arity {
            return Err(TacError::ArityMismatch {
                name: name.to_string(),
                expected: signature.arity,
                got: arguments.len(),
                loc: expr.loc,
            });
        }

        // The conversion builtins have dedicated TAC pseudo-ops; only
        // `print`, `println` and `input` survive as real calls.
        let pseudo_op = match name {
            "len" => Some(Operator::Len),
            "str" => Some(Operator::ToString),
            "int" => Some(Operator::FloatToInt),
            "float" => Some(Operator::IntToFloat),
            _ => None,
        };
        if let Some(operator) = pseudo_op {
            let operand = self.lower_expr(&arguments[0])?;
            let result = self.new_temp();
            self.emit(TacInstruction::unary_assign(&result, operator, operand));
            return Ok(Some(result));
        }
        if name == "bool" {
            let operand = self.lower_expr(&arguments[0])?;
            let result = self.new_temp();
            self.emit(TacInstruction::binary_assign(
                &result,
                operand,
                Operator::Ne,
                "0",
            ));
            return Ok(Some(result));
        }

        let mut argument_results = Vec::new();
        for argument in arguments {
            argument_results.push(self.lower_expr(argument)?);
        }
        for value in argument_results.clone() {
            self.emit(TacInstruction::PushParam { value });
        }

        let target = signature.returns_value.then(|| self.new_temp());
        self.emit(TacInstruction::Call {
            function: name.to_string(),
            param_count: arguments.len(),
            target: target.clone(),
        });
        if !arguments.is_empty() {
            self.emit(TacInstruction::PopParams {
                count: arguments.len(),
            });
        }
        for value in argument_results {
            self.release_if_temp(&value);
        }
        Ok(target)
    }

    /// `obj.method(args)`: the object's resolved class picks the target,
    /// walking the superclass chain for inherited methods. Dispatch is
    /// purely lexical.
    fn lower_method_call(
        &mut self,
        object: &Expr,
        property: &str,
        arguments: &[Expr],
        expr: &Expr,
    ) -> Result<Option<String>, TacError> {
        let class_name = object
            .resolved_type
            .as_ref()
            .map(|t| t.base.clone())
            .or_else(|| {
                matches!(object.data, ExprData::This)
                    .then(|| self.current_class.clone())
                    .flatten()
            })
            .ok_or_else(|| TacError::MethodOnUntypedObject {
                property: property.to_string(),
                loc: expr.loc,
            })?;

        let mut search = Some(class_name.clone());
        let info = loop {
            let Some(current) = search else {
                return Err(TacError::UndeclaredFunction {
                    name: format!("{class_name}_{property}"),
                    loc: expr.loc,
                });
            };
            let qualified = format!("{current}_{property}");
            if let Some(info) = self.functions.get(&qualified).cloned() {
                break info;
            }
            search = self.classes.get(&current).and_then(|c| c.superclass.clone());
        };

        let this_operand = self.lower_expr(object)?;
        let target = info.name.clone();
        self.emit_call(&target, &info, Some(this_operand), arguments, expr)
    }

    /// Shared call emission: arity check, `this` then arguments in
    /// declaration order, the call itself, and parameter cleanup.
    fn emit_call(
        &mut self,
        function: &str,
        info: &FunctionInfo,
        this_operand: Option<String>,
        arguments: &[Expr],
        expr: &Expr,
    ) -> Result<Option<String>, TacError> {
        if arguments.len() != info.declared_arity() {
            return Err(TacError::ArityMismatch {
                name: function.to_string(),
                expected: info.declared_arity(),
                got: arguments.len(),
                loc: expr.loc,
            });
        }

        // Evaluate everything before the first PushParam: a nested call in
        // an argument would otherwise interleave its own parameter queue
        // with this one.
        let mut pushed = Vec::new();
        if let Some(this_operand) = this_operand {
            pushed.push(this_operand);
        }
        for argument in arguments {
            pushed.push(self.lower_expr(argument)?);
        }
        for value in pushed.clone() {
            self.emit(TacInstruction::PushParam { value });
        }

        if self.current_function.as_deref() == Some(function) {
            debug!("recursive call to {function}");
            self.emit(TacInstruction::comment(format!(
                "Recursive call to {function}"
            )));
        }

        let target = info.returns_value().then(|| self.new_temp());
        self.emit(TacInstruction::Call {
            function: function.to_string(),
            param_count: pushed.len(),
            target: target.clone(),
        });
        if !pushed.is_empty() {
            self.emit(TacInstruction::PopParams {
                count: pushed.len(),
            });
        }
        for value in pushed {
            self.release_if_temp(&value);
        }
        Ok(target)
    }
}
