use kiln_core::{config::Config, context::Context, dtype::DType, error::KilnError, interpreter::Buffer};
use kiln_hlir::{
    interpreter::evaluate,
    passes::{AlgebraicSimplify, CommonSubexpressionElimination, DeadCodeElimination},
    Builder, Computation, InstrCode, InstrKind, Instruction, Module, Optimizer, Pass,
    ParameterConfig,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const F64: ParameterConfig = ParameterConfig::new(DType::F64);

fn single(computation: Computation) -> Result<Module, KilnError> {
    let mut module = Module::new("module0");
    module.add_computation(computation)?;
    Ok(module)
}

fn only(module: &Module) -> &Computation {
    module.computations().next().expect("module has a computation")
}

#[test]
fn empty_pipeline_is_identity() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "add_computation");
    let x = builder.add_instruction(Instruction::parameter(0, [20usize, 40], "x", F64))?;
    let y = builder.add_instruction(Instruction::parameter(1, [20usize, 40], "y", F64))?;
    let s = builder.add_instruction(Instruction::binary([20usize, 40], InstrCode::Add, x, y))?;
    // Dead and duplicate instructions stay without passes
    builder.add_instruction(Instruction::binary([20usize, 40], InstrCode::Add, x, y))?;
    builder.set_root(s)?;
    let mut module = single(builder.build()?)?;
    let before = module.clone();
    let optimizer = Optimizer::new();
    assert!(!optimizer.run(&mut module)?);
    assert_eq!(module, before);
    Ok(())
}

#[test]
fn cse_merges_commuted_binaries() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 4usize, "x", F64))?;
    let y = builder.add_instruction(Instruction::parameter(1, 4usize, "y", F64))?;
    let a = builder.add_instruction(Instruction::binary(4usize, InstrCode::Add, x, y))?;
    let b = builder.add_instruction(Instruction::binary(4usize, InstrCode::Add, y, x))?;
    // Sub is not commutative, so x - y and y - x stay
    let c = builder.add_instruction(Instruction::binary(4usize, InstrCode::Sub, x, y))?;
    let d = builder.add_instruction(Instruction::binary(4usize, InstrCode::Sub, y, x))?;
    let e = builder.add_instruction(Instruction::binary(4usize, InstrCode::Mul, a, b))?;
    let f = builder.add_instruction(Instruction::binary(4usize, InstrCode::Mul, c, d))?;
    builder.add_instruction(Instruction::binary(4usize, InstrCode::Add, e, f))?;
    let mut computation = builder.build()?;
    let params = [
        Buffer::from_scalars(vec![4], vec![1f64, 2., 3., 4.])?,
        Buffer::from_scalars(vec![4], vec![5f64, -1., 0.5, 2.])?,
    ];
    let expected = evaluate(&computation, &params)?;
    assert!(CommonSubexpressionElimination.run(&mut computation)?);
    assert_eq!(computation.len(), 8);
    let root = computation.instruction(computation.root());
    assert!(matches!(root.map(Instruction::kind), Some(InstrKind::Binary { code: InstrCode::Add, .. })));
    assert_eq!(evaluate(&computation, &params)?, expected);
    // Second run finds nothing
    assert!(!CommonSubexpressionElimination.run(&mut computation)?);
    Ok(())
}

#[test]
fn dce_keeps_parameters_and_root() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 4usize, "x", F64))?;
    let y = builder.add_instruction(Instruction::parameter(1, 4usize, "y", F64))?;
    builder.add_instruction(Instruction::parameter(2, 4usize, "unused", F64))?;
    let dead = builder.add_instruction(Instruction::binary(4usize, InstrCode::Mul, x, y))?;
    builder.add_instruction(Instruction::binary(4usize, InstrCode::Max, dead, dead))?;
    let root = builder.add_instruction(Instruction::binary(4usize, InstrCode::Add, x, y))?;
    builder.set_root(root)?;
    let mut computation = builder.build()?;
    assert!(DeadCodeElimination.run(&mut computation)?);
    assert_eq!(computation.len(), 4);
    assert_eq!(computation.parameters().len(), 3);
    assert_eq!(computation.root().0, 3);
    assert!(!DeadCodeElimination.run(&mut computation)?);
    Ok(())
}

#[test]
fn simplify_folds_and_forwards() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 3usize, "x", F64))?;
    let zero = builder.add_instruction(Instruction::constant(3usize, -0f64))?;
    let one = builder.add_instruction(Instruction::constant(3usize, 1f64))?;
    let a = builder.add_instruction(Instruction::binary(3usize, InstrCode::Add, x, zero))?;
    let b = builder.add_instruction(Instruction::binary(3usize, InstrCode::Mul, one, a))?;
    let two = builder.add_instruction(Instruction::constant(3usize, 2f64))?;
    let three = builder.add_instruction(Instruction::constant(3usize, 3f64))?;
    let c = builder.add_instruction(Instruction::binary(3usize, InstrCode::Add, two, three))?;
    builder.add_instruction(Instruction::binary(3usize, InstrCode::Mul, b, c))?;
    let mut computation = builder.build()?;
    let params = [Buffer::from_scalars(vec![3], vec![1f64, -2., 7.])?];
    let expected = evaluate(&computation, &params)?;
    assert_eq!(expected.to_f64(), [5., -10., 35.]);

    assert!(AlgebraicSimplify.run(&mut computation)?);
    // a and b are gone, c is a constant
    assert_eq!(computation.len(), 7);
    assert!(computation
        .instructions()
        .iter()
        .any(|i| i.as_constant().map(|c| c.to_f64()) == Some(5.)));
    assert_eq!(evaluate(&computation, &params)?, expected);

    assert!(DeadCodeElimination.run(&mut computation)?);
    assert_eq!(computation.len(), 3);
    assert_eq!(evaluate(&computation, &params)?, expected);
    Ok(())
}

#[test]
fn root_is_never_forwarded() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 2usize, "x", F64))?;
    let zero = builder.add_instruction(Instruction::constant(2usize, 0f64))?;
    builder.add_instruction(Instruction::binary(2usize, InstrCode::Sub, x, zero))?;
    let mut computation = builder.build()?;
    let before = computation.clone();
    assert!(!AlgebraicSimplify.run(&mut computation)?);
    assert_eq!(computation, before);
    Ok(())
}

#[test]
fn signed_zero_survives_simplify() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 2usize, "x", F64))?;
    let zero = builder.add_instruction(Instruction::constant(2usize, 0f64))?;
    let neg_zero = builder.add_instruction(Instruction::constant(2usize, -0f64))?;
    let one = builder.add_instruction(Instruction::constant(2usize, 1f64))?;
    let a = builder.add_instruction(Instruction::binary(2usize, InstrCode::Add, x, zero))?;
    let b = builder.add_instruction(Instruction::binary(2usize, InstrCode::Sub, x, neg_zero))?;
    let c = builder.add_instruction(Instruction::binary(2usize, InstrCode::Div, one, a))?;
    let d = builder.add_instruction(Instruction::binary(2usize, InstrCode::Div, one, b))?;
    builder.add_instruction(Instruction::binary(2usize, InstrCode::Min, c, d))?;
    let mut computation = builder.build()?;
    let params = [Buffer::from_scalars(vec![2], vec![-0f64, 2.])?];
    let expected = evaluate(&computation, &params)?;
    assert_eq!(expected.to_f64(), [f64::INFINITY, 0.5]);
    assert!(!AlgebraicSimplify.run(&mut computation)?);
    assert_eq!(evaluate(&computation, &params)?, expected);
    Ok(())
}

#[test]
fn integer_zero_is_forwarded() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let x = builder.add_instruction(Instruction::parameter(0, 2usize, "x", ParameterConfig::new(DType::I32)))?;
    let zero = builder.add_instruction(Instruction::constant(2usize, 0i32))?;
    let a = builder.add_instruction(Instruction::binary(2usize, InstrCode::Add, zero, x))?;
    builder.add_instruction(Instruction::binary(2usize, InstrCode::Mul, a, a))?;
    let mut computation = builder.build()?;
    assert!(AlgebraicSimplify.run(&mut computation)?);
    assert_eq!(computation.len(), 3);
    let params = [Buffer::from_scalars(vec![2], vec![-3i32, 4])?];
    assert_eq!(evaluate(&computation, &params)?.to_f64(), [9., 16.]);
    Ok(())
}

#[test]
fn integer_division_by_zero_is_not_folded() -> Result<(), KilnError> {
    let ctx = Context::new();
    let mut builder = Builder::new(&ctx, "c");
    let one = builder.add_instruction(Instruction::constant(2usize, 1i32))?;
    let zero = builder.add_instruction(Instruction::constant(2usize, 0i32))?;
    builder.add_instruction(Instruction::binary(2usize, InstrCode::Div, one, zero))?;
    let mut computation = builder.build()?;
    assert!(!AlgebraicSimplify.run(&mut computation)?);
    assert!(evaluate(&computation, &[]).is_err());
    Ok(())
}

#[test]
fn pipeline_from_config() -> Result<(), KilnError> {
    init_logger();
    let optimizer = Optimizer::from_config(&Config::default())?;
    assert_eq!(optimizer.pass_names().collect::<Vec<_>>(), ["simplify", "cse", "dce"]);

    let config = Config { debug: 0, passes: vec!["dce".into(), "fold".into()] };
    assert!(matches!(Optimizer::from_config(&config), Err(KilnError::ConfigError(_))));

    let optimizer = Optimizer::new().with_pass(DeadCodeElimination).with_pass(AlgebraicSimplify);
    assert_eq!(optimizer.pass_names().collect::<Vec<_>>(), ["dce", "simplify"]);
    Ok(())
}

#[test]
fn pipeline_runs_on_every_computation() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::with_config(Config { debug: 0b1100, ..Config::default() });
    let mut module = Module::new("module0");
    for name in ["a", "b"] {
        let mut builder = Builder::new(&ctx, name);
        let x = builder.add_instruction(Instruction::parameter(0, 2usize, "x", F64))?;
        let y = builder.add_instruction(Instruction::parameter(1, 2usize, "y", F64))?;
        builder.add_instruction(Instruction::binary(2usize, InstrCode::Min, x, y))?;
        let s = builder.add_instruction(Instruction::binary(2usize, InstrCode::Add, x, y))?;
        builder.add_instruction(Instruction::binary(2usize, InstrCode::Add, y, x))?;
        builder.set_root(s)?;
        module.add_computation(builder.build()?)?;
    }
    let optimizer = Optimizer::from_config(ctx.config())?;
    assert!(optimizer.run(&mut module)?);
    for computation in module.computations() {
        assert_eq!(computation.len(), 3, "{computation}");
    }
    // Already optimal
    assert!(!optimizer.run(&mut module)?);
    Ok(())
}

#[test]
fn default_pipeline_preserves_results() -> Result<(), KilnError> {
    init_logger();
    let ctx = Context::new();
    let optimizer = Optimizer::from_config(&Config::default())?;
    // No Mul, so values stay small and never reach inf or NaN
    let codes = [InstrCode::Add, InstrCode::Sub, InstrCode::Max, InstrCode::Min];
    let mut rng = SmallRng::seed_from_u64(21_342);
    for round in 0..100 {
        let n_params = rng.gen_range(1..4);
        let mut builder = Builder::new(&ctx, "random");
        let mut ids = Vec::new();
        let mut params = Vec::new();
        for i in 0..n_params {
            ids.push(builder.add_instruction(Instruction::parameter(i, 3usize, "", F64))?);
            let data: Vec<f64> = (0..3).map(|_| f64::from(rng.gen_range(-4i32..5))).collect();
            params.push(Buffer::from_scalars(vec![3], data)?);
        }
        for _ in 0..rng.gen_range(1..20) {
            let inst = if rng.gen_bool(0.2) {
                Instruction::constant(3usize, f64::from(rng.gen_range(0i32..3)))
            } else {
                let code = codes[rng.gen_range(0..codes.len())];
                let x = ids[rng.gen_range(0..ids.len())];
                let y = ids[rng.gen_range(0..ids.len())];
                Instruction::binary(3usize, code, x, y)
            };
            ids.push(builder.add_instruction(inst)?);
        }
        let root = ids[rng.gen_range(0..ids.len())];
        builder.set_root(root)?;
        let mut module = single(builder.build()?)?;
        let expected = evaluate(only(&module), &params)?;
        let len = only(&module).len();
        optimizer.run(&mut module)?;
        let computation = only(&module);
        assert!(computation.len() <= len);
        assert_eq!(computation.parameters().len(), n_params);
        let res = evaluate(computation, &params)?;
        assert_eq!(res.to_f64(), expected.to_f64(), "round {round}\n{computation}");
        ctx.reset();
    }
    Ok(())
}
