//! Integration tests for parsing and rendering.
//!
//! Tests cover: variable output, loops and conditionals, control signals,
//! array access, access and index-type errors, numeric comparison, error
//! markers, includes, host filters, whitespace control,
//! comments, global assignment, and scoping.

use liquid_rs_core::error::EvaluationError;
use liquid_rs_template::{
    parse, FilterRegistry, Object, RenderHooks, Renderer, StringLoader, Value,
};

fn data(pairs: &[(&str, Value)]) -> Object {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn object(pairs: &[(&str, Value)]) -> Value {
    Value::Map(data(pairs))
}

// ═════════════════════════════════════════════════════════════════════
// 1. Variable output
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_hello_name() {
    let tmpl = parse("Hello {{ name }}!", None).unwrap();
    let out = tmpl.render(data(&[("name", Value::from("Alice"))]));
    assert_eq!(out, "Hello Alice!");
}

#[test]
fn test_several_variables() {
    let tmpl = parse(
        "Hi! My name is {{ name }} and I am {{ age }} years old.",
        None,
    )
    .unwrap();
    let out = tmpl.render(data(&[("name", Value::from("Bob")), ("age", Value::Int(18))]));
    assert_eq!(out, "Hi! My name is Bob and I am 18 years old.");
}

#[test]
fn test_assign_round_trip() {
    for (expr, expected) in [("42", "42"), ("'text'", "text"), ("true", "true"), ("nil", "")] {
        let tmpl = parse(&format!("{{% assign x = {expr} %}}{{{{ x }}}}"), None).unwrap();
        assert_eq!(tmpl.render(Object::new()), expected);
    }
}

// ═════════════════════════════════════════════════════════════════════
// 2. Loops and conditionals
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_for_with_forloop_last() {
    let tmpl = parse(
        "I love {% for fruit in fruits %}{{ fruit }}{% if forloop.last == false %}, {% endif %}{% endfor %}!",
        None,
    )
    .unwrap();
    let out = tmpl.render(data(&[(
        "fruits",
        Value::from(vec!["apples", "strawberries", "bananas"]),
    )]));
    assert_eq!(out, "I love apples, strawberries, bananas!");
}

#[test]
fn test_break_and_continue() {
    let tmpl = parse(
        "{% for n in numbers %}{% if n > 10 %}{% break %}{% elsif n <= 3 %}{% continue %}{% endif %}{{ n }}{% endfor %}",
        None,
    )
    .unwrap();
    let out = tmpl.render(data(&[("numbers", Value::from(vec![1, 2, 5, 4, 12, 10]))]));
    assert_eq!(out, "54");
}

#[test]
fn test_logic_operators() {
    let tmpl = parse(
        "{% if x or y %}1{% endif %}{% if a >= b %}2{% endif %}{% if a and b %}3{% endif %}{% if a != b %}4{% endif %}",
        None,
    )
    .unwrap();
    let out = tmpl.render(data(&[
        ("x", Value::Bool(true)),
        ("y", Value::Bool(false)),
        ("a", Value::Int(5)),
        ("b", Value::Int(10)),
    ]));
    assert_eq!(out, "134");
}

#[test]
fn test_contacts() {
    let tmpl = parse(
        concat!(
            " There are {{ contacts.length }} contacts.",
            " {% for c in contacts %}                  ",
            "   {% if c.private %}                     ",
            " This contact is private.                 ",
            "   {% else %}                             ",
            " Contact {{ c['name'] }} ({{ c.age }}).   ",
            "   {% endif %}                            ",
            " {% endfor %}                             ",
        ),
        None,
    )
    .unwrap();
    let contacts = Value::Array(vec![
        object(&[("name", Value::from("Bob")), ("age", Value::Int(19))]),
        object(&[("name", Value::from("Alice")), ("age", Value::Int(18))]),
        object(&[
            ("name", Value::from("Eve")),
            ("age", Value::Int(22)),
            ("private", Value::Bool(true)),
        ]),
    ]);

    let out = tmpl.render(data(&[("contacts", contacts)]));
    assert!(out.contains("There are 3 contacts."));
    assert!(out.contains("Contact Alice (18)."));
    assert!(out.contains("19"));
    assert!(!out.contains("Eve"));
    assert!(out.contains("This contact is private."));
}

#[test]
fn test_loop_variable_shadows_then_reverts() {
    let tmpl = parse(
        "{% assign x = 'outer' %}{% for x in [1, 2] %}{{ x }}{% endfor %}{{ x }}",
        None,
    )
    .unwrap();
    assert_eq!(tmpl.render(Object::new()), "12outer");
}

// ═════════════════════════════════════════════════════════════════════
// 3. Control signals
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_eject_keeps_output() {
    let tmpl = parse(
        "{% for n in numbers %}{% if n == 5 %}{% eject %}{% endif %}{{ n }}{% endfor %}bye",
        None,
    )
    .unwrap();
    let out = tmpl.render(data(&[("numbers", Value::from(vec![1, 2, 3, 4, 5, 6]))]));
    assert_eq!(out, "1234");
}

#[test]
fn test_discard_clears_output() {
    let tmpl = parse(
        "{% for n in numbers %}{% if n == 5 %}{% discard %}{% endif %}{{ n }}{% endfor %}bye",
        None,
    )
    .unwrap();
    let out = tmpl.render(data(&[("numbers", Value::from(vec![1, 2, 3, 4, 5, 6]))]));
    assert_eq!(out, "");
}

#[test]
fn test_break_outside_for_stops_rendering() {
    let tmpl = parse("a{% if true %}b{% break %}c{% endif %}d", None).unwrap();
    let mut renderer = Renderer::new();
    assert_eq!(renderer.render(&tmpl, Object::new()), "ab");

    let next = parse("{% for i in [1, 2] %}{{ i }}{% endfor %}", None).unwrap();
    assert_eq!(renderer.render(&next, Object::new()), "12");
}

// ═════════════════════════════════════════════════════════════════════
// 4. Array access and errors
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_array_access_with_variable_index() {
    let tmpl = parse("{% assign index = 1 %}{{ numbers[index] }}", None).unwrap();
    let out = tmpl.render(data(&[("numbers", Value::from(vec![1, 2, 3]))]));
    assert_eq!(out, "2");
}

#[test]
fn test_error_marker_and_error_list() {
    let tmpl = parse("{% assign age = 20 %}{{ age.bad_property }}", None).unwrap();
    let mut renderer = Renderer::new();
    let out = renderer.render(&tmpl, Object::new());

    assert!(out.starts_with("{!"));
    assert_eq!(renderer.errors().len(), 1);

    let offset = renderer.errors()[0].offset.unwrap();
    assert_eq!(
        tmpl.line(offset),
        "{% assign age = 20 %}{{ age.bad_property }}"
    );
}

#[test]
fn test_access_on_undefined_variable_is_an_error() {
    for source in ["[{{ nope.x }}]", "[{{ nope[0] }}]", "[{{ nope[true] }}]"] {
        let tmpl = parse(source, None).unwrap();
        let mut renderer = Renderer::new();
        let out = renderer.render(&tmpl, Object::new());

        assert!(out.starts_with("[{!"), "{source} rendered {out:?}");
        assert!(out.ends_with("!}"), "{source} rendered {out:?}");
        assert_eq!(renderer.errors().len(), 1, "{source}");
    }
}

#[test]
fn test_index_must_be_string_or_int() {
    let d = data(&[
        ("xs", Value::from(vec![1, 2, 3])),
        ("half", Value::Double(1.5)),
        ("m", object(&[("a", Value::from(1))])),
    ]);

    for source in ["{{ xs[half] }}", "{{ xs[true] }}", "{{ m[xs] }}", "{{ m[nil] }}"] {
        let tmpl = parse(source, None).unwrap();
        let mut renderer = Renderer::new();
        renderer.render(&tmpl, d.clone());

        assert_eq!(renderer.errors().len(), 1, "{source}");
        assert_eq!(
            renderer.errors()[0].message,
            "Index must be a 'string' or an 'int'",
            "{source}"
        );
    }
}

#[test]
fn test_numeric_comparisons_with_doubles() {
    let tmpl = parse(
        "{{ x == 1 }} {{ x == x }} {{ half < 1 }} {{ two == 2 }}",
        None,
    )
    .unwrap();
    let out = tmpl.render(data(&[
        ("x", Value::Double(f64::NAN)),
        ("half", Value::Double(0.5)),
        ("two", Value::Double(2.0)),
    ]));
    assert_eq!(out, "false true true true");
}

// ═════════════════════════════════════════════════════════════════════
// 5. Includes
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_include_with_arguments_and_parent_scope() {
    let mut renderer = Renderer::new();

    let print_name = parse("{% if include %}{{ include.text }}{% endif %}", None).unwrap();
    assert_eq!(print_name.render(Object::new()), "");
    renderer.register_template("print_name", print_name);

    let page = parse("Hello {% include print_name with text=name %}!", None).unwrap();
    let out = renderer.render(&page, data(&[("name", Value::from("World"))]));
    assert_eq!(out, "Hello World!");

    renderer.register_template(
        "is_digit",
        parse(
            "{% if include.number > 9 %}{% assign result = false parent_scope %}{% else %}{% assign result = true parent_scope %}{% endif %}",
            None,
        )
        .unwrap(),
    );
    let page = parse(
        "{% include is_digit with number = 10 %}{{result}}{% include is_digit with number = 9 %}{{result}}",
        None,
    )
    .unwrap();
    assert_eq!(renderer.render(&page, Object::new()), "falsetrue");
}

#[test]
fn test_nested_includes_through_loader() {
    let loader = StringLoader::new();
    loader.add("outer", "<{% include inner with n = include.n * 2 %}>");
    loader.add("inner", "{{ include.n }}");

    let mut renderer = Renderer::new();
    renderer.add_loader(loader);

    let page = parse("{% for i in [1, 2] %}{% include outer with n = i %}{% endfor %}", None).unwrap();
    assert_eq!(renderer.render(&page, Object::new()), "<2><4>");
}

// ═════════════════════════════════════════════════════════════════════
// 6. Host filters
// ═════════════════════════════════════════════════════════════════════

struct BankHooks;

impl RenderHooks for BankHooks {
    fn register_filters(&self, filters: &mut FilterRegistry) {
        filters.register_fn("uppercase", |v, _| {
            Ok(Value::from(v.to_display_string().to_uppercase()))
        });
        filters.register_fn("mul", |v, args| match (v.as_int(), args.first().and_then(Value::as_int)) {
            (Some(x), Some(y)) => Ok(Value::Int(x * y)),
            _ => Err(EvaluationError::new("mul expects two integers")),
        });
        filters.register_fn("substr", |v, args| {
            let (Some(s), Some(pos), Some(count)) = (
                v.as_str(),
                args.first().and_then(Value::as_int),
                args.get(1).and_then(Value::as_int),
            ) else {
                return Err(EvaluationError::new("substr expects a string, a position and a count"));
            };
            let pos = usize::try_from(pos).unwrap_or(0);
            let count = usize::try_from(count).unwrap_or(0);
            Ok(Value::from(s.chars().skip(pos).take(count).collect::<String>()))
        });
    }
}

#[test]
fn test_host_filters() {
    let tmpl = parse(
        "Hello {{ 'Bob2' | substr: 0, 3 | uppercase }}, your account now contains {{ money | mul: 2 }} dollars.",
        None,
    )
    .unwrap();
    let out = tmpl.render_with(BankHooks, data(&[("money", Value::Int(5))]));
    assert_eq!(out, "Hello BOB, your account now contains 10 dollars.");
}

#[test]
fn test_host_filter_error_reported() {
    let tmpl = parse("{{ 'x' | mul: 2 }}", None).unwrap();
    let mut renderer = Renderer::with_hooks(BankHooks);
    let out = renderer.render(&tmpl, Object::new());
    assert_eq!(out, "{! 1:10: mul expects two integers !}");
}

#[test]
fn test_array_filters() {
    let tmpl = parse(
        "{% assign names = persons | map: 'name' %}{{ names | first }} {{ names | last }} {{ names | join: '|' }}",
        None,
    )
    .unwrap();
    let persons = Value::Array(vec![
        object(&[("name", Value::from("SpongeBob")), ("surname", Value::from("SquarePants"))]),
        object(&[("name", Value::from("Patrick")), ("surname", Value::from("Star"))]),
        object(&[("name", Value::from("Squidward")), ("surname", Value::from("Tentacles"))]),
    ]);
    let out = tmpl.render(data(&[("persons", persons)]));
    assert_eq!(out, "SpongeBob Squidward SpongeBob|Patrick|Squidward");
}

#[test]
fn test_filter_pipeline_left_associates() {
    let tmpl = parse("{{ xs | push: 4 | concat: [5] | pop | join: ',' }}", None).unwrap();
    let out = tmpl.render(data(&[("xs", Value::from(vec![1, 2, 3]))]));
    assert_eq!(out, "1,2,3,4");
}

// ═════════════════════════════════════════════════════════════════════
// 7. Whitespace control and comments
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_manual_whitespace_control() {
    let mut tmpl = parse(
        concat!(
            "{% assign username = 'John G.Chalmers - Smith' %}\n",
            "{% if username and username.size > 10 %}\n",
            "  Wow, {{ username }}, you have a long name!\n",
            "{% else %}\n",
            "  Hello there!\n",
            "{% endif %}",
        ),
        None,
    )
    .unwrap();

    assert_eq!(
        tmpl.render(Object::new()),
        "\n\n  Wow, John G.Chalmers - Smith, you have a long name!\n"
    );

    tmpl.strip_whitespace_at_tag();
    assert_eq!(
        tmpl.render(Object::new()),
        "Wow, John G.Chalmers - Smith, you have a long name!\n"
    );
}

#[test]
fn test_whitespace_control_in_loops() {
    let mut tmpl = parse(
        concat!(
            "{% for p in people %}\n",
            "  - {{ p }}\n",
            "{% endfor %}\n",
            "{% for p in people %}\n",
            "{{''}}  - {{ p }}\n",
            "{% endfor %}\n",
        ),
        None,
    )
    .unwrap();
    tmpl.strip_whitespace_at_tag();

    let out = tmpl.render(data(&[("people", Value::from(vec!["Bob", "Alice"]))]));
    assert_eq!(out, "- Bob\n- Alice\n  - Bob\n  - Alice\n");
}

#[test]
fn test_comments() {
    let tmpl = parse(
        "Hello there!{% comment General Kenobi ! %}\n  You're a bold 1.",
        None,
    )
    .unwrap();
    assert_eq!(tmpl.render(Object::new()), "Hello there!\n  You're a bold 1.");
}

// ═════════════════════════════════════════════════════════════════════
// 8. Global assignment
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_assign_global_visible_to_host() {
    let tmpl = parse("{% assign foo = ['bar', 0] global %}", None).unwrap();
    let mut renderer = Renderer::new();
    renderer.render(&tmpl, Object::new());

    let foo = renderer.globals().unwrap().get("foo").unwrap();
    assert_eq!(foo.at(0), Value::from("bar"));
    assert_eq!(foo.at(1), Value::Int(0));
}

#[test]
fn test_render_is_deterministic() {
    let tmpl = parse("{% for k in m %}{{ k }}{{ m[k] }}{% endfor %}", None).unwrap();
    let d = data(&[(
        "m",
        object(&[("z", Value::Int(1)), ("a", Value::Int(2)), ("m", Value::Int(3))]),
    )]);
    let first = tmpl.render(d.clone());
    assert_eq!(first, "a2m3z1");
    assert_eq!(tmpl.render(d), first);
}
