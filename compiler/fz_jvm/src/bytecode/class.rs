//! Class, interface, method and field declarations.

use bitflags::bitflags;

use super::verify::{parameter_locals, verify, CodeInfo, VerifyError};
use super::{Code, Instr, InvokeKind, JavaType, MethodDescriptor, MethodRef, JAVA_LANG_OBJECT};

bitflags! {
    /// JVM access flags of classes, fields and methods.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        /// On classes: `invokespecial` uses the new semantics.
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldShape {
    pub name: String,
    pub ty: JavaType,
    pub flags: AccessFlags,
}

impl FieldShape {
    pub fn instance(name: impl Into<String>, ty: JavaType) -> Self {
        FieldShape {
            name: name.into(),
            ty,
            flags: AccessFlags::PUBLIC,
        }
    }

    pub fn constant(name: impl Into<String>, ty: JavaType) -> Self {
        FieldShape {
            name: name.into(),
            ty,
            flags: AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodShape {
    pub name: String,
    pub desc: MethodDescriptor,
    pub flags: AccessFlags,
    /// `None` for abstract methods.
    pub code: Option<Code>,
    /// Filled in by verification when the class is finished.
    pub info: Option<CodeInfo>,
}

impl MethodShape {
    pub fn new_static(name: impl Into<String>, desc: MethodDescriptor, code: Code) -> Self {
        MethodShape {
            name: name.into(),
            desc,
            flags: AccessFlags::PUBLIC | AccessFlags::STATIC,
            code: Some(code),
            info: None,
        }
    }

    pub fn new_instance(name: impl Into<String>, desc: MethodDescriptor, code: Code) -> Self {
        MethodShape {
            name: name.into(),
            desc,
            flags: AccessFlags::PUBLIC,
            code: Some(code),
            info: None,
        }
    }

    pub fn new_abstract(name: impl Into<String>, desc: MethodDescriptor) -> Self {
        MethodShape {
            name: name.into(),
            desc,
            flags: AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
            code: None,
            info: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(AccessFlags::ABSTRACT)
    }
}

/// A class or interface to be written as one class file.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassShape {
    pub name: String,
    pub flags: AccessFlags,
    pub super_class: String,
    /// Implemented interfaces, in the order they were added.
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldShape>,
    pub methods: Vec<MethodShape>,
    /// Static initialization code collected so far.
    clinit: Code,
}

impl ClassShape {
    pub fn class(name: impl Into<String>) -> Self {
        ClassShape {
            name: name.into(),
            flags: AccessFlags::PUBLIC | AccessFlags::SUPER,
            super_class: JAVA_LANG_OBJECT.to_owned(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            clinit: Code::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        ClassShape {
            flags: AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
            ..ClassShape::class(name)
        }
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(AccessFlags::INTERFACE)
    }

    /// Add `interface` to the implemented interfaces unless already present.
    pub fn add_interface(&mut self, interface: &str) {
        if !self.implements(interface) {
            self.interfaces.push(interface.to_owned());
        }
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Add `field` unless a field of that name exists. Returns whether it was added.
    pub fn add_field(&mut self, field: FieldShape) -> bool {
        if self.has_field(&field.name) {
            return false;
        }
        self.fields.push(field);
        true
    }

    pub fn method(&self, name: &str, desc: &MethodDescriptor) -> Option<&MethodShape> {
        self.methods
            .iter()
            .find(|m| m.name == name && &m.desc == desc)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    /// Add `method` unless one with the same name and descriptor exists.
    /// Returns whether it was added.
    pub fn add_method(&mut self, method: MethodShape) -> bool {
        if self.method(&method.name, &method.desc).is_some() {
            return false;
        }
        self.methods.push(method);
        true
    }

    /// Append code run once when the class is initialized.
    pub fn add_to_clinit(&mut self, code: Code) {
        self.clinit.append(code);
    }

    /// Add the default constructor and static initializer, then verify all
    /// method bodies and record their frames.
    pub fn finish(&mut self) -> Result<(), (String, VerifyError)> {
        if !self.is_interface() && self.method("<init>", &MethodDescriptor::void()).is_none() {
            let code = Code::of(Instr::Load(JavaType::object(self.name.clone()), 0))
                .then(Instr::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(JAVA_LANG_OBJECT, "<init>", MethodDescriptor::void()),
                ))
                .then(Instr::Return(JavaType::Void));
            self.methods
                .push(MethodShape::new_instance("<init>", MethodDescriptor::void(), code));
        }
        if self.clinit.has_effect() {
            let code = std::mem::take(&mut self.clinit).then(Instr::Return(JavaType::Void));
            self.methods
                .push(MethodShape::new_static("<clinit>", MethodDescriptor::void(), code));
        }

        for m in &mut self.methods {
            let Some(code) = &m.code else {
                continue;
            };
            let receiver = (!m.is_static()).then_some(self.name.as_str());
            let locals = parameter_locals(receiver, &m.desc.params);
            let info = verify(code, locals, &m.desc.ret).map_err(|e| (m.name.clone(), e))?;
            m.info = Some(info);
        }
        Ok(())
    }
}
