use machfile_types::Matrix;
use serde_json::Value as JsonValue;

/// Nested arrays, one level per dimension. `None` if an element is not finite.
pub(crate) fn encode(matrix: &Matrix) -> Option<JsonValue> {
    if matrix.data().iter().any(|x| !x.is_finite()) {
        return None;
    }
    Some(nest(matrix.data(), matrix.shape()))
}

fn nest(data: &[f64], shape: &[usize]) -> JsonValue {
    match shape {
        [] | [_] => JsonValue::Array(data.iter().map(|x| JsonValue::from(*x)).collect()),
        [rows, rest @ ..] => {
            let stride: usize = rest.iter().product();
            JsonValue::Array(
                (0..*rows)
                    .map(|i| nest(&data[i * stride..(i + 1) * stride], rest))
                    .collect(),
            )
        }
    }
}

/// Reads a rectangular nested numeric array. `None` for ragged or non-numeric input.
pub(crate) fn decode(value: &JsonValue) -> Option<Matrix> {
    let mut walk = Walk::default();
    walk.visit(value, 0)?;
    Matrix::new(walk.shape, walk.data)
}

#[derive(Default)]
struct Walk {
    shape: Vec<usize>,
    data: Vec<f64>,
    leaf_depth: Option<usize>,
}

impl Walk {
    fn visit(&mut self, value: &JsonValue, depth: usize) -> Option<()> {
        match value {
            JsonValue::Array(items) => {
                if self.leaf_depth.is_some_and(|leaf| depth >= leaf) {
                    return None;
                }
                match self.shape.get(depth) {
                    Some(&len) if len != items.len() => return None,
                    Some(_) => {}
                    None => self.shape.push(items.len()),
                }
                for item in items {
                    self.visit(item, depth + 1)?;
                }
                Some(())
            }
            JsonValue::Number(n) => {
                match self.leaf_depth {
                    Some(leaf) if leaf != depth => return None,
                    Some(_) => {}
                    None if depth == 0 || depth != self.shape.len() => return None,
                    None => self.leaf_depth = Some(depth),
                }
                self.data.push(n.as_f64()?);
                Some(())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_rectangular_arrays() {
        let m = decode(&json!([[1, 2, 3], [4.5, 5, 6]])).unwrap();
        assert_eq!(m.shape(), &[2, 3]);
        assert_eq!(m.get(&[1, 0]), Some(4.5));
        assert_eq!(encode(&m), Some(json!([[1.0, 2.0, 3.0], [4.5, 5.0, 6.0]])));
    }

    #[test]
    fn rejects_ragged_and_mixed_depth_arrays() {
        assert!(decode(&json!([[1, 2], [3]])).is_none());
        assert!(decode(&json!([[1], [[2]]])).is_none());
        assert!(decode(&json!([1, [2]])).is_none());
        assert!(decode(&json!([[1, "x"]])).is_none());
        assert!(decode(&json!(3)).is_none());
    }

    #[test]
    fn empty_dimensions_are_kept() {
        let m = decode(&json!([])).unwrap();
        assert_eq!(m.shape(), &[0]);
        assert_eq!(encode(&m), Some(json!([])));

        let rows = Matrix::new(vec![2, 0], Vec::new()).unwrap();
        assert_eq!(encode(&rows), Some(json!([[], []])));
        assert_eq!(decode(&json!([[], []])), Some(rows));
    }

    #[test]
    fn non_finite_elements_cannot_be_written() {
        assert!(encode(&Matrix::vector(vec![1.0, f64::NAN])).is_none());
    }
}
