//! Evaluation of parsed queries against document nodes

use std::cmp::Ordering;

use serde_yaml::Value;

use super::node::{Node, Scalar};
use super::parser::{CmpOp, Expr, Step};

static NULL: Node = Node::Scalar(Scalar {
    text: String::new(),
    quoted: false,
    value: Value::Null,
});

pub(crate) fn eval(expr: &Expr, input: &Node) -> Vec<Node> {
    match expr {
        Expr::Path(steps) => walk(steps, input).into_iter().cloned().collect(),
        Expr::Literal(value) => vec![Node::from_value(value)],
        Expr::Pipe(left, right) => eval(left, input)
            .iter()
            .flat_map(|node| eval(right, node))
            .collect(),
        Expr::Compare(left, op, right) => {
            let rhs = eval(right, input);
            eval(left, input)
                .iter()
                .flat_map(|l| rhs.iter().map(move |r| boolean(compare(l, *op, r))))
                .collect()
        }
        Expr::And(left, right) => {
            let rhs = eval(right, input);
            eval(left, input)
                .iter()
                .flat_map(|l| rhs.iter().map(move |r| boolean(truthy(l) && truthy(r))))
                .collect()
        }
        Expr::Or(left, right) => {
            let rhs = eval(right, input);
            eval(left, input)
                .iter()
                .flat_map(|l| rhs.iter().map(move |r| boolean(truthy(l) || truthy(r))))
                .collect()
        }
        Expr::Select(cond) => {
            if eval(cond, input).iter().any(truthy) {
                vec![input.clone()]
            } else {
                Vec::new()
            }
        }
        Expr::Not => vec![boolean(!truthy(input))],
        Expr::Length => vec![length(input)],
        Expr::Keys => keys(input).into_iter().collect(),
    }
}

fn walk<'a>(steps: &[Step], input: &'a Node) -> Vec<&'a Node> {
    let mut current = vec![input];

    for step in steps {
        current = current
            .into_iter()
            .flat_map(|node| apply(step, node))
            .collect();
    }

    current
}

fn apply<'a>(step: &Step, node: &'a Node) -> Vec<&'a Node> {
    match (step, node) {
        (Step::Field(key), _) => vec![node.get(key).unwrap_or(&NULL)],
        (Step::Index(index), Node::Sequence(items)) => {
            let resolved = if *index < 0 {
                usize::try_from(index.unsigned_abs())
                    .ok()
                    .and_then(|back| items.len().checked_sub(back))
            } else {
                usize::try_from(*index).ok()
            };
            vec![resolved.and_then(|i| items.get(i)).unwrap_or(&NULL)]
        }
        (Step::Index(_), _) => vec![&NULL],
        (Step::Iterate, Node::Sequence(items)) => items.iter().collect(),
        (Step::Iterate, Node::Mapping(entries)) => entries.iter().map(|(_, v)| v).collect(),
        (Step::Iterate, Node::Scalar(_)) => Vec::new(),
    }
}

fn boolean(b: bool) -> Node {
    Node::from_value(&Value::Bool(b))
}

fn truthy(node: &Node) -> bool {
    !matches!(node.as_value(), Some(Value::Null | Value::Bool(false)))
}

fn compare(left: &Node, op: CmpOp, right: &Node) -> bool {
    let (left, right) = (left.to_value(), right.to_value());
    match op {
        CmpOp::Eq => equal(&left, &right),
        CmpOp::Ne => !equal(&left, &right),
        CmpOp::Lt => order(&left, &right) == Some(Ordering::Less),
        CmpOp::Le => matches!(order(&left, &right), Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => order(&left, &right) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(order(&left, &right), Some(Ordering::Greater | Ordering::Equal)),
    }
}

fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn length(node: &Node) -> Node {
    let len = match node {
        Node::Sequence(items) => items.len(),
        Node::Mapping(entries) => entries.len(),
        Node::Scalar(scalar) => match &scalar.value {
            Value::Null => 0,
            Value::String(s) => s.chars().count(),
            _ => return Node::null(),
        },
    };
    Node::from_value(&Value::from(len as u64))
}

fn keys(node: &Node) -> Option<Node> {
    match node {
        Node::Mapping(entries) => Some(Node::Sequence(
            entries.iter().map(|(k, _)| k.clone()).collect(),
        )),
        Node::Sequence(items) => Some(Node::Sequence(
            (0..items.len() as u64)
                .map(|i| Node::from_value(&Value::from(i)))
                .collect(),
        )),
        Node::Scalar(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::node::load;
    use super::super::parser::parse;
    use super::*;

    fn run(expr: &str, yaml: &str) -> Vec<Value> {
        let docs = load(yaml.as_bytes()).unwrap();
        eval(&parse(expr).unwrap(), &docs[0])
            .iter()
            .map(Node::to_value)
            .collect()
    }

    #[test]
    fn identity_returns_document() {
        let out = run(".", "a: 1");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["a"], Value::from(1));
    }

    #[test]
    fn negative_index_past_start_is_null() {
        assert_eq!(run(".[-3]", "[1, 2]"), vec![Value::Null]);
        assert_eq!(run(".[-2]", "[1, 2]"), vec![Value::from(1)]);
    }

    #[test]
    fn iterate_mapping_values() {
        assert_eq!(run(".[]", "{a: 1, b: 2}"), vec![Value::from(1), Value::from(2)]);
        assert!(run(".[]", "scalar").is_empty());
    }

    #[test]
    fn integer_and_float_compare_equal() {
        assert_eq!(run(".a == 1.0", "a: 1"), vec![Value::Bool(true)]);
        assert_eq!(run(".a != 1", "a: 2"), vec![Value::Bool(true)]);
    }

    #[test]
    fn quoted_number_is_not_equal_to_number() {
        assert_eq!(run(".a == 1", "a: \"1\""), vec![Value::Bool(false)]);
        assert_eq!(run(".a == \"1\"", "a: \"1\""), vec![Value::Bool(true)]);
    }

    #[test]
    fn mixed_type_ordering_is_false() {
        assert_eq!(run(".a < 3", "a: x"), vec![Value::Bool(false)]);
        assert_eq!(run(".a >= \"b\"", "a: c"), vec![Value::Bool(true)]);
    }

    #[test]
    fn select_keeps_truthy_inputs() {
        let out = run(".[] | select(.on)", "[{on: true, n: 1}, {on: false, n: 2}, {n: 3}]");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["n"], Value::from(1));
    }

    #[test]
    fn not_inverts_truthiness() {
        assert_eq!(run(".a | not", "a: null"), vec![Value::Bool(true)]);
        assert_eq!(run(".a | not", "a: 0"), vec![Value::Bool(false)]);
    }

    #[test]
    fn sees_through_tags() {
        assert_eq!(run(".a.b", "a: !custom {b: 5}"), vec![Value::from(5)]);
    }

    #[test]
    fn keys_of_sequence_are_indices() {
        assert_eq!(
            run("keys", "[x, y]"),
            vec![Value::Sequence(vec![Value::from(0u64), Value::from(1u64)])]
        );
        assert!(run("keys", "5").is_empty());
    }

    #[test]
    fn length_of_scalar_number_is_null() {
        assert_eq!(run("length", "5"), vec![Value::Null]);
        assert_eq!(run(".missing | length", "{}"), vec![Value::from(0u64)]);
    }
}
