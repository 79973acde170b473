use xstat::program::serialize_rows;
use xstat::{serialize_matrix, Dataset, StatError};

/// Independent reader for `matrix(c(...), nrow=R, ncol=C, byrow=TRUE)`.
fn parse_matrix_literal(text: &str) -> Vec<Vec<f64>> {
    let body = text
        .strip_prefix("matrix(c(")
        .expect("literal starts with matrix(c(");
    let (values, dims) = body.split_once("), ").expect("values close before dims");
    let dims = dims.strip_suffix(')').expect("literal closes");

    let mut nrow = None;
    let mut ncol = None;
    let mut byrow = false;
    for part in dims.split(", ") {
        let (key, value) = part.split_once('=').expect("key=value dimension");
        match key {
            "nrow" => nrow = Some(value.parse::<usize>().unwrap()),
            "ncol" => ncol = Some(value.parse::<usize>().unwrap()),
            "byrow" => byrow = value == "TRUE",
            other => panic!("unexpected argument {}", other),
        }
    }
    assert!(byrow, "serializer must emit row-major literals");
    let (nrow, ncol) = (nrow.unwrap(), ncol.unwrap());

    let flat: Vec<f64> = values.split(',').map(|v| v.parse::<f64>().unwrap()).collect();
    assert_eq!(flat.len(), nrow * ncol);
    flat.chunks(ncol).map(|row| row.to_vec()).collect()
}

#[test]
fn test_literal_reconstructs_dataset() {
    let rows = vec![
        vec![1.0, -2.5, 0.0],
        vec![1e-9, 123456789.125, -0.0],
        vec![3.0e20, 0.1, -7.75e-6],
        vec![42.0, 1.0 / 3.0, f64::MAX],
    ];
    let dataset = Dataset::new(rows.clone()).unwrap();
    let literal = serialize_matrix(&dataset).unwrap();
    assert_eq!(parse_matrix_literal(&literal), rows);
}

#[test]
fn test_single_cell_literal() {
    let literal = serialize_rows(&[vec![5.0]]).unwrap();
    assert_eq!(literal, "matrix(c(5), nrow=1, ncol=1, byrow=TRUE)");
    assert_eq!(parse_matrix_literal(&literal), vec![vec![5.0]]);
}

#[test]
fn test_literal_has_no_locale_separators() {
    let literal = serialize_rows(&[vec![1234567.5, 0.25], vec![-1000.0, 2.0]]).unwrap();
    assert_eq!(
        literal,
        "matrix(c(1234567.5,0.25,-1000,2), nrow=2, ncol=2, byrow=TRUE)"
    );
}

#[test]
fn test_non_finite_values_rejected() {
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = serialize_rows(&[vec![1.0, bad], vec![2.0, 3.0]]).unwrap_err();
        match err {
            StatError::Format(message) => {
                assert!(message.contains("row 1"), "{}", message);
                assert!(message.contains("column 2"), "{}", message);
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }
}

#[test]
fn test_ragged_and_empty_rejected() {
    assert!(matches!(
        serialize_rows(&[vec![1.0, 2.0], vec![3.0]]),
        Err(StatError::Format(_))
    ));
    assert!(matches!(serialize_rows(&[]), Err(StatError::Format(_))));
}
