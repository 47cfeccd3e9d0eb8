//! A small interpreter for generated classes.
//!
//! Executes the instruction lists of a [`CompiledProgram`] directly, with
//! just enough of the JVM to run what the backend emits: objects with named
//! fields, statics with lazy class initialization, virtual and interface
//! dispatch on the runtime class, and the runtime support methods.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bytecode::{ClassShape, Cond, Instr, InvokeKind, JavaType, Label, MethodRef, MethodShape};
use crate::{names, CompiledProgram};

/// A JVM value. `Float` and `Double` hold raw bits.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    Null,
    Ref(usize),
    Str(String),
}

impl Value {
    pub fn int(&self) -> i32 {
        match self {
            Value::Int(i) => *i,
            other => panic!("expected int, found {other:?}"),
        }
    }

    pub fn long(&self) -> i64 {
        match self {
            Value::Long(l) => *l,
            other => panic!("expected long, found {other:?}"),
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    fn default_for(ty: &JavaType) -> Value {
        match ty {
            JavaType::Long => Value::Long(0),
            JavaType::Float => Value::Float(0),
            JavaType::Double => Value::Double(0),
            JavaType::Object(_) | JavaType::Void => Value::Null,
            _ => Value::Int(0),
        }
    }
}

/// Why execution stopped abnormally.
#[derive(Clone, Debug, PartialEq)]
pub enum Trap {
    /// `Runtime.fatal` was called.
    Fatal(String),
    /// The step budget ran out, e.g. in the endless loop after a trap.
    StepLimit,
    /// Something a real JVM would reject or throw for.
    Error(String),
}

#[derive(Clone, Debug)]
struct Object {
    class: String,
    fields: FxHashMap<String, Value>,
}

pub struct Machine<'p> {
    classes: FxHashMap<&'p str, &'p ClassShape>,
    heap: Vec<Object>,
    statics: FxHashMap<(String, String), Value>,
    initialized: FxHashSet<String>,
    /// Messages passed to `Runtime.trace`.
    pub traces: Vec<String>,
    steps: u64,
    step_limit: u64,
    depth: usize,
    /// Deepest nesting of method invocations seen, not counting
    /// constructors and class initializers.
    pub max_depth: usize,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p CompiledProgram) -> Self {
        Machine {
            classes: program
                .classes
                .iter()
                .map(|c| (c.name.as_str(), c))
                .collect(),
            heap: Vec::new(),
            statics: FxHashMap::default(),
            initialized: FxHashSet::default(),
            traces: Vec::new(),
            steps: 0,
            step_limit: 50_000_000,
            depth: 0,
            max_depth: 0,
        }
    }

    /// Call the static method `name` of `class`.
    pub fn call_static(
        &mut self,
        class: &str,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Trap> {
        let method = self
            .classes
            .get(class)
            .copied()
            .and_then(|c| c.methods.iter().find(|m| m.name == name))
            .ok_or_else(|| Trap::Error(format!("no method {class}.{name}")))?;
        self.ensure_initialized(class)?;
        self.run(method, locals_of(args))
    }

    /// Field `name` of the object `obj` refers to.
    pub fn field(&self, obj: &Value, name: &str) -> Option<Value> {
        match obj {
            Value::Ref(i) => self.heap[*i].fields.get(name).cloned(),
            _ => None,
        }
    }

    /// Runtime class of the object `obj` refers to.
    fn ensure_initialized(&mut self, class: &str) -> Result<(), Trap> {
        if !self.initialized.insert(class.to_owned()) {
            return Ok(());
        }
        let clinit = self
            .classes
            .get(class)
            .copied()
            .and_then(|c| c.methods.iter().find(|m| m.name == "<clinit>"));
        if let Some(m) = clinit {
            self.run(m, Vec::new())?;
        }
        Ok(())
    }

    fn is_instance(&self, class: &str, target: &str) -> bool {
        if class == target || target == crate::bytecode::JAVA_LANG_OBJECT {
            return true;
        }
        self.classes
            .get(class)
            .is_some_and(|c| c.implements(target))
    }

    fn alloc(&mut self, class: &str) -> Result<Value, Trap> {
        self.ensure_initialized(class)?;
        let shape = self
            .classes
            .get(class)
            .copied()
            .ok_or_else(|| Trap::Error(format!("no class {class}")))?;
        let fields = shape
            .fields
            .iter()
            .filter(|f| !f.is_static())
            .map(|f| (f.name.clone(), Value::default_for(&f.ty)))
            .collect();
        self.heap.push(Object {
            class: class.to_owned(),
            fields,
        });
        Ok(Value::Ref(self.heap.len() - 1))
    }

    fn invoke(&mut self, kind: InvokeKind, m: &MethodRef, args: Vec<Value>) -> Result<Option<Value>, Trap> {
        match (m.class.as_str(), m.name.as_str()) {
            (names::RUNTIME_CLASS, names::RUNTIME_FATAL) => {
                return Err(Trap::Fatal(string_arg(&args)));
            }
            (names::RUNTIME_CLASS, names::RUNTIME_TRACE) => {
                self.traces.push(string_arg(&args));
                return Ok(None);
            }
            ("java/lang/Float", "floatToRawIntBits") => match args.as_slice() {
                [Value::Float(bits)] => return Ok(Some(Value::Int(*bits as i32))),
                _ => return Err(Trap::Error("bad float argument".to_owned())),
            },
            ("java/lang/Double", "doubleToRawLongBits") => match args.as_slice() {
                [Value::Double(bits)] => return Ok(Some(Value::Long(*bits as i64))),
                _ => return Err(Trap::Error("bad double argument".to_owned())),
            },
            (crate::bytecode::JAVA_LANG_OBJECT, "<init>") => return Ok(None),
            _ => {}
        }
        let class = match kind {
            InvokeKind::Static | InvokeKind::Special => m.class.clone(),
            InvokeKind::Virtual | InvokeKind::Interface => match args.first() {
                Some(Value::Ref(i)) => self.heap[*i].class.clone(),
                other => return Err(Trap::Error(format!("invoke {} on {other:?}", m.name))),
            },
        };
        if kind == InvokeKind::Static {
            self.ensure_initialized(&class)?;
        }
        let method = self
            .classes
            .get(class.as_str())
            .copied()
            .and_then(|c| c.method(&m.name, &m.desc))
            .ok_or_else(|| Trap::Error(format!("no method {class}.{}{}", m.name, m.desc)))?;
        if method.is_abstract() {
            return Err(Trap::Error(format!("abstract method {class}.{}", m.name)));
        }
        self.run(method, locals_of(args))
    }

    fn run(&mut self, method: &'p MethodShape, mut locals: Vec<Value>) -> Result<Option<Value>, Trap> {
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| Trap::Error(format!("no code for {}", method.name)))?;
        let instrs = code.instrs();
        let labels: FxHashMap<Label, usize> = instrs
            .iter()
            .enumerate()
            .filter_map(|(i, instr)| match instr {
                Instr::Bind(l) => Some((*l, i)),
                _ => None,
            })
            .collect();

        let frame = usize::from(!method.name.starts_with('<'));
        self.depth += frame;
        self.max_depth = self.max_depth.max(self.depth);
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;
        let result = loop {
            self.steps += 1;
            if self.steps > self.step_limit {
                break Err(Trap::StepLimit);
            }
            let Some(instr) = instrs.get(pc) else {
                break Err(Trap::Error(format!("fell off the end of {}", method.name)));
            };
            pc += 1;
            match self.step(instr, &mut stack, &mut locals, &labels, &mut pc) {
                Ok(None) => {}
                Ok(Some(ret)) => break Ok(ret),
                Err(trap) => break Err(trap),
            }
        };
        self.depth -= frame;
        result
    }

    /// Execute one instruction. Returns `Some` on return.
    #[allow(clippy::too_many_lines)]
    fn step(
        &mut self,
        instr: &Instr,
        stack: &mut Vec<Value>,
        locals: &mut Vec<Value>,
        labels: &FxHashMap<Label, usize>,
        pc: &mut usize,
    ) -> Result<Option<Option<Value>>, Trap> {
        let pop = |stack: &mut Vec<Value>| stack.pop().ok_or_else(|| Trap::Error("stack underflow".to_owned()));
        match instr {
            Instr::Comment(_) | Instr::Bind(_) => {}
            Instr::IConst(i) => stack.push(Value::Int(*i)),
            Instr::LConst(l) => stack.push(Value::Long(*l)),
            Instr::FConst(bits) => stack.push(Value::Float(*bits)),
            Instr::DConst(bits) => stack.push(Value::Double(*bits)),
            Instr::AConstNull => stack.push(Value::Null),
            Instr::Ldc(s) => stack.push(Value::Str(s.clone())),
            Instr::Load(_, slot) => {
                let v = locals
                    .get(usize::from(*slot))
                    .cloned()
                    .ok_or_else(|| Trap::Error(format!("read of unset local {slot}")))?;
                stack.push(v);
            }
            Instr::Store(_, slot) => {
                let v = pop(stack)?;
                let slot = usize::from(*slot);
                if locals.len() <= slot + 1 {
                    locals.resize(slot + 2, Value::Null);
                }
                locals[slot] = v;
            }
            Instr::Pop => {
                pop(stack)?;
            }
            Instr::Pop2 => {
                if !pop(stack)?.is_wide() {
                    pop(stack)?;
                }
            }
            Instr::Dup => {
                let v = pop(stack)?;
                stack.push(v.clone());
                stack.push(v);
            }
            Instr::DupX1 => {
                let v1 = pop(stack)?;
                let v2 = pop(stack)?;
                stack.push(v1.clone());
                stack.push(v2);
                stack.push(v1);
            }
            Instr::Swap => {
                let v1 = pop(stack)?;
                let v2 = pop(stack)?;
                stack.push(v1);
                stack.push(v2);
            }
            Instr::IAdd | Instr::ISub | Instr::IMul => {
                let b = pop(stack)?.int();
                let a = pop(stack)?.int();
                stack.push(Value::Int(match instr {
                    Instr::IAdd => a.wrapping_add(b),
                    Instr::ISub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                }));
            }
            Instr::LAdd | Instr::LSub | Instr::LMul => {
                let b = pop(stack)?.long();
                let a = pop(stack)?.long();
                stack.push(Value::Long(match instr {
                    Instr::LAdd => a.wrapping_add(b),
                    Instr::LSub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                }));
            }
            Instr::LCmp => {
                let b = pop(stack)?.long();
                let a = pop(stack)?.long();
                stack.push(Value::Int(a.cmp(&b) as i32));
            }
            Instr::New(class) => {
                let obj = self.alloc(class)?;
                stack.push(obj);
            }
            Instr::CheckCast(class) => {
                let v = pop(stack)?;
                let ok = match &v {
                    Value::Null => true,
                    Value::Ref(i) => self.is_instance(&self.heap[*i].class, class),
                    Value::Str(_) => {
                        class == crate::bytecode::JAVA_LANG_STRING
                            || class == crate::bytecode::JAVA_LANG_OBJECT
                    }
                    _ => false,
                };
                if !ok {
                    return Err(Trap::Error(format!("cannot cast {v:?} to {class}")));
                }
                stack.push(v);
            }
            Instr::GetField(f) => match pop(stack)? {
                Value::Ref(i) => {
                    let v = self.heap[i]
                        .fields
                        .get(&f.name)
                        .cloned()
                        .ok_or_else(|| Trap::Error(format!("no field {}", f.name)))?;
                    stack.push(v);
                }
                other => return Err(Trap::Error(format!("getfield {} on {other:?}", f.name))),
            },
            Instr::PutField(f) => {
                let v = pop(stack)?;
                match pop(stack)? {
                    Value::Ref(i) => {
                        let fields = &mut self.heap[i].fields;
                        if !fields.contains_key(&f.name) {
                            return Err(Trap::Error(format!("no field {}", f.name)));
                        }
                        fields.insert(f.name.clone(), v);
                    }
                    other => {
                        return Err(Trap::Error(format!("putfield {} on {other:?}", f.name)))
                    }
                }
            }
            Instr::GetStatic(f) => {
                self.ensure_initialized(&f.class)?;
                let v = self
                    .statics
                    .get(&(f.class.clone(), f.name.clone()))
                    .cloned()
                    .unwrap_or_else(|| Value::default_for(&f.ty));
                stack.push(v);
            }
            Instr::PutStatic(f) => {
                self.ensure_initialized(&f.class)?;
                let v = pop(stack)?;
                self.statics.insert((f.class.clone(), f.name.clone()), v);
            }
            Instr::Invoke(kind, m) => {
                let count = m.desc.params.len() + usize::from(*kind != InvokeKind::Static);
                if stack.len() < count {
                    return Err(Trap::Error("stack underflow".to_owned()));
                }
                let args = stack.split_off(stack.len() - count);
                if let Some(v) = self.invoke(*kind, m, args)? {
                    stack.push(v);
                }
            }
            Instr::If(cond, label) => {
                let taken = match cond {
                    Cond::Eq | Cond::Ne | Cond::Lt | Cond::Ge | Cond::Gt | Cond::Le => {
                        let v = pop(stack)?.int();
                        match cond {
                            Cond::Eq => v == 0,
                            Cond::Ne => v != 0,
                            Cond::Lt => v < 0,
                            Cond::Ge => v >= 0,
                            Cond::Gt => v > 0,
                            _ => v <= 0,
                        }
                    }
                    Cond::ICmpEq
                    | Cond::ICmpNe
                    | Cond::ICmpLt
                    | Cond::ICmpGe
                    | Cond::ICmpGt
                    | Cond::ICmpLe => {
                        let b = pop(stack)?.int();
                        let a = pop(stack)?.int();
                        match cond {
                            Cond::ICmpEq => a == b,
                            Cond::ICmpNe => a != b,
                            Cond::ICmpLt => a < b,
                            Cond::ICmpGe => a >= b,
                            Cond::ICmpGt => a > b,
                            _ => a <= b,
                        }
                    }
                    Cond::ACmpEq | Cond::ACmpNe => {
                        let b = pop(stack)?;
                        let a = pop(stack)?;
                        (a == b) == (*cond == Cond::ACmpEq)
                    }
                    Cond::Null | Cond::NonNull => {
                        let v = pop(stack)?;
                        (v == Value::Null) == (*cond == Cond::Null)
                    }
                };
                if taken {
                    *pc = labels[label];
                }
            }
            Instr::Goto(label) => *pc = labels[label],
            Instr::Return(ty) => {
                let v = if ty.is_void() { None } else { Some(pop(stack)?) };
                return Ok(Some(v));
            }
        }
        Ok(None)
    }
}

/// Wide arguments take two local slots.
fn locals_of(args: Vec<Value>) -> Vec<Value> {
    let mut locals = Vec::with_capacity(args.len());
    for a in args {
        let wide = a.is_wide();
        locals.push(a);
        if wide {
            locals.push(Value::Null);
        }
    }
    locals
}

fn string_arg(args: &[Value]) -> String {
    match args {
        [Value::Str(s)] => s.clone(),
        other => format!("{other:?}"),
    }
}
