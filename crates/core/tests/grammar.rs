//! Parses the formula shapes used across pipelines and checks the
//! structure and source spans the evaluator relies on.

use tally_core::{parse, Builtin, Callee, ExprKind, ParamName, MAX_NESTING};

#[test]
fn pipeline_formulas_parse() {
    let formulas = [
        "(1+(3*2)/(4-2)*(8+(4/3.5)))^2",
        "-2*4*3",
        "if(:a>:b, 'yes', 'no')",
        "coalesce(null, :missing_as_null, 'fallback')",
        "switch(:fuel,'diesel',2.68,'petrol',2.31,default='0', ignoreCase=true)",
        "ref('distance') * 1.5",
        "as_timestamp(:date,'M/d/yy', timezone='America/Denver', roundDownTo='quarter')",
        "convert(:value, 'm', 'cm', quantityKind='length')",
        "impact('electricity:us','co2e','co2', group='/acme', version='latest')",
        "lookup(:zip,'zip_to_state','zip','state', versionAsAt='2022-1-1')",
        "#vehicle_emissions(10,'diesel', group='/acme/fleet')",
        "assign_to_group(concat('/acme/', :site))",
        "split('a,b,c', ',', limit=2, index=1)",
        "search('the greenhouse gas', 'GAS', ignoreCase=true)",
        "get_value(:payload, '$.emissions[0].value')",
        "set :one:two = 1\nset :x = :one:two + 1\n:x",
    ];
    for f in formulas {
        if let Err(e) = parse(f) {
            panic!("{} failed to parse: {}", f, e);
        }
    }
}

#[test]
fn audit_text_is_taken_from_source() {
    let program = parse("concat( upper_not_a_fn_name_but_string , 'x')");
    assert!(program.is_err());

    let program = parse("set :total = #co2('a',  2) * 10").unwrap();
    let ExprKind::Set { value, .. } = &program.statements[0].kind else {
        panic!("expected set");
    };
    let ExprKind::Binary { left, .. } = &value.kind else {
        panic!("expected product");
    };
    assert_eq!(program.text(left.span), "#co2('a',  2)");
}

#[test]
fn named_values_are_full_expressions() {
    let program = parse("switch(:a, 'x', 1, default=concat('a','b'))").unwrap();
    let ExprKind::Call(call) = &program.statements[0].kind else {
        panic!("expected call");
    };
    assert_eq!(call.callee, Callee::Builtin(Builtin::Switch));
    let default = call.named(ParamName::DefaultValue).unwrap();
    assert!(matches!(default.kind, ExprKind::Call(_)));
    assert_eq!(program.text(default.span), "concat('a','b')");
}

#[test]
fn newline_inside_call_is_whitespace() {
    let program = parse("concat(\n  'a',\n  'b'\n)\n").unwrap();
    assert_eq!(program.statements.len(), 1);
}

#[test]
fn error_positions_point_at_offending_token() {
    let err = parse("set :a = 1\nset b = 2").unwrap_err();
    assert_eq!((err.line, err.column), (2, 5));
}

#[test]
fn deep_nesting_is_a_parse_error() {
    let depth = 1000;
    let formula = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    let err = parse(&formula).unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.message.contains("nests deeper than"), "{}", err);

    let negated = format!("{}1", "-".repeat(depth));
    assert!(parse(&negated).is_err());
    let tower = vec!["2"; depth].join("^");
    assert!(parse(&tower).is_err());
}

#[test]
fn nesting_within_the_limit_parses() {
    let depth = MAX_NESTING / 2;
    let formula = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert!(parse(&formula).is_ok());
}

#[test]
fn long_operator_chains_are_bounded() {
    let sum = vec!["1"; 1000].join(" + ");
    let err = parse(&sum).unwrap_err();
    assert!(err.message.contains("nests deeper than"), "{}", err);

    let short = vec!["1"; 20].join(" + ");
    assert!(parse(&short).is_ok());
}
