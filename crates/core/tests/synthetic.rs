use std::io::Write;

use flate2::{write::GzEncoder, Compression};
use ndarray::Array2;
use pcorr::{
    correlate_column, load_matrix, pearson, read_matrix, run, Correlation, FormatError, Matrix,
    RankedResult, RowFormatter, RowOrder, RunConfig,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn labels(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

/// Random matrix with roughly `missing` of its cells set to NaN.
fn noisy_matrix(seed: u64, rows: usize, cols: usize, missing: f64) -> Matrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = Array2::from_shape_fn((rows, cols), |(i, j)| {
        if rng.gen_bool(missing) {
            f64::NAN
        } else {
            (i as f64) * ((j % 3) as f64 - 1.0) + rng.gen_range(-5.0..5.0)
        }
    });
    Matrix::new(labels("r", rows), labels("c", cols), data).expect("matrix shape")
}

fn render(matrix: &Matrix, config: &RunConfig) -> String {
    let mut out = Vec::new();
    run(matrix, config, &RowFormatter::default(), &mut out).expect("run");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn coefficients_stay_in_range_and_are_symmetric() {
    let m = noisy_matrix(7, 40, 15, 0.2);
    let corr = pearson::correlation_matrix(m.data(), 3);

    for i in 0..m.n_cols() {
        for j in 0..m.n_cols() {
            let r = corr[[i, j]];
            assert!(r.is_nan() || (-1.0..=1.0).contains(&r), "r[{i},{j}] = {r}");
            assert!(
                (r.is_nan() && corr[[j, i]].is_nan()) || approx_eq(r, corr[[j, i]], 1e-12),
                "asymmetric at ({i},{j})"
            );
        }
        assert!(approx_eq(corr[[i, i]], 1.0, 1e-12));
    }
}

#[test]
fn threshold_applies_regardless_of_values() {
    // c0 and c1 share only two rows.
    let m = Matrix::from_rows(
        labels("r", 5),
        labels("c", 2),
        vec![
            vec![1.0, f64::NAN],
            vec![2.0, f64::NAN],
            vec![3.0, f64::NAN],
            vec![4.0, 10.0],
            vec![5.0, 20.0],
        ],
    )
    .expect("matrix");

    let config = RunConfig::default();
    match correlate_column(&m, 0, &config) {
        RankedResult::Full(values) => {
            assert!(approx_eq(values[0].value().unwrap(), 1.0, 1e-12));
            assert_eq!(values[1], Correlation::Missing);
        }
        other => panic!("expected full row, got {other:?}"),
    }

    let lenient = RunConfig {
        min_samples: 2,
        ..RunConfig::default()
    };
    match correlate_column(&m, 0, &lenient) {
        RankedResult::Full(values) => assert!(approx_eq(values[1].value().unwrap(), 1.0, 1e-12)),
        other => panic!("expected full row, got {other:?}"),
    }
}

#[test]
fn top_n_length_matches_available_partners() {
    let m = noisy_matrix(11, 12, 10, 0.45);
    let full = RunConfig::default();

    for n in [1, 3, 10] {
        let config = RunConfig {
            top_n: n,
            ..RunConfig::default()
        };
        for i in 0..m.n_cols() {
            let available = match correlate_column(&m, i, &full) {
                RankedResult::Full(values) => values.iter().filter(|r| !r.is_missing()).count(),
                other => panic!("expected full row, got {other:?}"),
            };
            match correlate_column(&m, i, &config) {
                RankedResult::Top(partners) => {
                    assert_eq!(partners.len(), n.min(available));
                    assert!(partners.windows(2).all(|w| w[0].value >= w[1].value));
                }
                other => panic!("expected top-n row, got {other:?}"),
            }
        }
    }
}

#[test]
fn output_is_identical_across_worker_counts() {
    let m = noisy_matrix(3, 30, 25, 0.1);
    for top_n in [0, 5] {
        let base = render(
            &m,
            &RunConfig {
                top_n,
                threads: Some(1),
                ..RunConfig::default()
            },
        );
        for threads in [2, 4, 8] {
            let other = render(
                &m,
                &RunConfig {
                    top_n,
                    threads: Some(threads),
                    ..RunConfig::default()
                },
            );
            assert_eq!(base, other, "top_n={top_n} threads={threads}");
        }
    }
}

#[test]
fn column_order_holds_back_at_most_one_block() {
    let m = noisy_matrix(13, 20, 600, 0.05);
    let config = RunConfig {
        top_n: 3,
        threads: Some(4),
        ..RunConfig::default()
    };
    let mut out = Vec::new();
    let summary = run(&m, &config, &RowFormatter::default(), &mut out).expect("run");

    assert_eq!(summary.rows, 600);
    assert_eq!(summary.threads, 4);
    assert!(
        summary.peak_buffered < pcorr::engine::REORDER_BLOCK_PER_THREAD * 4,
        "peak_buffered = {}",
        summary.peak_buffered
    );

    let text = String::from_utf8(out).expect("utf8");
    let emitted: Vec<&str> = text.lines().map(|l| l.split('\t').next().unwrap()).collect();
    assert_eq!(emitted, m.columns().iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn completion_order_emits_whole_rows() {
    let m = noisy_matrix(5, 20, 30, 0.1);
    let ordered = render(&m, &RunConfig::default());
    let unordered = render(
        &m,
        &RunConfig {
            threads: Some(4),
            order: RowOrder::Completion,
            ..RunConfig::default()
        },
    );

    let mut a: Vec<&str> = ordered.lines().collect();
    let mut b: Vec<&str> = unordered.lines().collect();
    // Header is always first.
    assert_eq!(a[0], b[0]);
    assert_eq!(b.len(), m.n_cols() + 1);
    for line in &b[1..] {
        assert_eq!(line.split('\t').count(), m.n_cols() + 1);
    }
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, b);
}

#[test]
fn full_matrix_two_columns() {
    let m = read_matrix("\tA\tB\nr1\t1\t3\nr2\t2\t1\nr3\t3\t2\n".as_bytes()).expect("matrix");
    assert_eq!(
        render(&m, &RunConfig::default()),
        "\tA\tB\nA\t1\t-0.5\nB\t-0.5\t1\n"
    );
}

#[test]
fn mixed_missing_example() {
    let input = "\tA\tB\tC\nr1\t1\t2\tNaN\nr2\t2\t4\tNaN\nr3\t3\t6\t1\nr4\t4\t8\t1\n";
    let m = read_matrix(input.as_bytes()).expect("matrix");
    let out = render(&m, &RunConfig::default());
    let rows: Vec<Vec<&str>> = out.lines().map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows[0], vec!["", "A", "B", "C"]);
    assert_eq!(rows[1][0], "A");
    assert!(approx_eq(rows[1][2].parse::<f64>().unwrap(), 1.0, 1e-12));
    assert_eq!(rows[1][3], "NaN");
    assert_eq!(rows[3], vec!["C", "NaN", "NaN", "NaN"]);

    let top = render(
        &m,
        &RunConfig {
            top_n: 2,
            ..RunConfig::default()
        },
    );
    let lines: Vec<&str> = top.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0] == "A\tA\tB" || lines[0] == "A\tB\tA");
    assert_eq!(lines[2], "C");
}

#[test]
fn loads_gzip_and_tarball_inputs() {
    let text = b"\tA\tB\nr1\t1\t2\nr2\t2\t4\nr3\t3\t7\n";
    let dir = tempfile::tempdir().expect("tempdir");

    let gz_path = dir.path().join("m.tsv.gz");
    let mut enc = GzEncoder::new(std::fs::File::create(&gz_path).unwrap(), Compression::default());
    enc.write_all(text).unwrap();
    enc.finish().unwrap();
    let m = load_matrix(&gz_path).expect("gzip matrix");
    assert_eq!(m.columns(), ["A", "B"]);
    assert_eq!(m.n_rows(), 3);

    let tar_path = dir.path().join("m.tar.gz");
    let enc = GzEncoder::new(std::fs::File::create(&tar_path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(enc);
    let mut header = tar::Header::new_gnu();
    header.set_size(text.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "m.tsv", &text[..])
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap();
    let m = load_matrix(&tar_path).expect("tarball matrix");
    assert_eq!(m.data()[[2, 1]], 7.0);

    let plain = dir.path().join("m.tsv");
    std::fs::write(&plain, text).unwrap();
    assert_eq!(load_matrix(&plain).expect("plain matrix").n_cols(), 2);

    let empty = dir.path().join("empty.tsv");
    std::fs::write(&empty, b"").unwrap();
    assert!(matches!(load_matrix(&empty), Err(FormatError::Empty)));
}
