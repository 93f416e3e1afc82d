use kiln_core::{context::Context, dtype::DType, error::KilnError, interpreter::Buffer};
use kiln_hlir::{
    interpreter::evaluate, Builder, InstrCode, InstrId, InstrKind, Instruction, Module,
    ParameterConfig,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const F32: ParameterConfig = ParameterConfig::new(DType::F32);

#[test]
fn add_computation() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "add_computation");
    let x = builder.add_instruction(Instruction::parameter(0, [20usize, 40], "x", F32))?;
    let y = builder.add_instruction(Instruction::parameter(1, [20usize, 40], "y", F32))?;
    let sum = builder.add_instruction(Instruction::binary([20usize, 40], InstrCode::Add, x, y))?;
    let computation = builder.build()?;
    assert_eq!(computation.len(), 3);
    assert_eq!(computation.root(), sum);
    assert_eq!(computation.parameters(), [x, y]);
    assert_eq!(computation.instruction(sum).and_then(Instruction::dtype), Some(DType::F32));
    let mut module = Module::new("module0");
    module.add_computation(computation)?;
    assert_eq!(module.len(), 1);
    assert!(module.computation("add_computation").is_some());
    Ok(())
}

#[test]
fn forward_reference() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, [20usize, 40], "x", F32))?;
    assert!(matches!(
        builder.add_instruction(Instruction::binary([20usize, 40], InstrCode::Add, x, InstrId(1))),
        Err(KilnError::InvalidOperandReference(_))
    ));
    // Failed instructions are not appended
    assert!(builder.add_instruction(Instruction::binary([20usize, 40], InstrCode::Add, x, x)).is_ok());
    assert_eq!(builder.build()?.len(), 2);
    Ok(())
}

#[test]
fn shape_mismatch() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, [20usize, 40], "x", F32))?;
    let y = builder.add_instruction(Instruction::parameter(1, [40usize, 20], "y", F32))?;
    assert!(matches!(
        builder.add_instruction(Instruction::binary([20usize, 40], InstrCode::Mul, x, y)),
        Err(KilnError::InvalidOperandReference(_))
    ));
    Ok(())
}

#[test]
fn dtype_mismatch() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 4usize, "x", F32))?;
    let y = builder.add_instruction(Instruction::constant(4usize, 2i32))?;
    assert_eq!(
        builder.add_instruction(Instruction::binary(4usize, InstrCode::Mul, x, y)),
        Err(KilnError::TypeMismatch { expected: DType::F32, found: DType::I32 })
    );
    Ok(())
}

#[test]
fn bool_arithmetic_is_rejected() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 4usize, "x", ParameterConfig::new(DType::Bool)))?;
    let f = builder.add_instruction(Instruction::constant(4usize, false))?;
    assert!(matches!(
        builder.add_instruction(Instruction::binary(4usize, InstrCode::Add, x, f)),
        Err(KilnError::InvalidOperandReference(_))
    ));
    assert!(builder.add_instruction(Instruction::binary(4usize, InstrCode::Max, x, f)).is_ok());
    Ok(())
}

#[test]
fn duplicate_parameter_index() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    builder.add_instruction(Instruction::parameter(0, 4usize, "x", F32))?;
    assert!(matches!(
        builder.add_instruction(Instruction::parameter(0, 4usize, "y", F32)),
        Err(KilnError::InvalidOperandReference(_))
    ));
    Ok(())
}

#[test]
fn builder_is_frozen_after_build() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 4usize, "x", F32))?;
    builder.build()?;
    assert!(matches!(
        builder.add_instruction(Instruction::binary(4usize, InstrCode::Add, x, x)),
        Err(KilnError::InvalidOperandReference(_))
    ));
    assert!(matches!(builder.set_root(x), Err(KilnError::InvalidOperandReference(_))));
    assert!(matches!(builder.build(), Err(KilnError::InvalidOperandReference(_))));
    Ok(())
}

#[test]
fn empty_computation() {
    let ctx = Context::new();
    assert!(matches!(
        Builder::new(&ctx, "c").build(),
        Err(KilnError::InvalidOperandReference(_))
    ));
}

#[test]
fn unnamed_parameters_get_unique_names() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 4usize, "", F32))?;
    let y = builder.add_instruction(Instruction::parameter(1, 4usize, "", F32))?;
    let computation = builder.build()?;
    let name = |id| match computation.instruction(id).map(Instruction::kind) {
        Some(InstrKind::Parameter { name, .. }) => name.to_string(),
        _ => String::new(),
    };
    assert!(name(x).starts_with("param"));
    assert!(name(y).starts_with("param"));
    assert_ne!(name(x), name(y));
    Ok(())
}

#[test]
fn duplicate_computation_name() -> Result<(), KilnError> {
    let ctx = Context::new();
    let build = |name: &str| -> Result<_, KilnError> {
        let mut builder = Builder::new(&ctx, name);
        builder.add_instruction(Instruction::parameter(0, [2usize, 2], "x", F32))?;
        builder.build()
    };
    let mut module = Module::new("m");
    module.add_computation(build("a")?)?;
    module.add_computation(build("b")?)?;
    assert_eq!(
        module.add_computation(build("a")?),
        Err(KilnError::DuplicateComputationName("a".into()))
    );
    assert_eq!(module.len(), 2);
    let names: Vec<&str> = module.computations().map(|c| c.name()).collect();
    assert_eq!(names, ["a", "b"]);
    Ok(())
}

#[test]
fn explicit_root_and_display() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 2usize, "x", F32))?;
    let two = builder.add_instruction(Instruction::constant(2usize, 2f32))?;
    let m = builder.add_instruction(Instruction::binary(2usize, InstrCode::Mul, x, two))?;
    builder.add_instruction(Instruction::binary(2usize, InstrCode::Add, m, two))?;
    builder.set_root(m)?;
    let computation = builder.build()?;
    assert_eq!(computation.root(), m);
    let shown = computation.to_string();
    assert!(shown.contains("ROOT %2"), "{shown}");
    Ok(())
}

#[test]
fn evaluate_elementwise() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, [2usize, 2], "x", F32))?;
    let y = builder.add_instruction(Instruction::parameter(1, [2usize, 2], "y", F32))?;
    let s = builder.add_instruction(Instruction::binary([2usize, 2], InstrCode::Sub, x, y))?;
    let half = builder.add_instruction(Instruction::constant([2usize, 2], 0.5f32))?;
    builder.add_instruction(Instruction::binary([2usize, 2], InstrCode::Max, s, half))?;
    let computation = builder.build()?;
    let a = Buffer::from_scalars(vec![2, 2], vec![1f32, 2., 3., 4.])?;
    let b = Buffer::from_scalars(vec![2, 2], vec![1f32, 0., 5., 1.])?;
    let res = evaluate(&computation, &[a.clone(), b])?;
    assert_eq!(res.shape(), [2, 2]);
    assert_eq!(res.to_f64(), [0.5, 2., 0.5, 3.]);
    // Wrong number of parameters
    assert!(matches!(evaluate(&computation, &[a.clone()]), Err(KilnError::EvalError(_))));
    // Wrong dtype
    let c = Buffer::from_scalars(vec![2, 2], vec![1i32, 2, 3, 4])?;
    assert!(matches!(
        evaluate(&computation, &[a, c]),
        Err(KilnError::TypeMismatch { expected: DType::F32, found: DType::I32 })
    ));
    Ok(())
}
