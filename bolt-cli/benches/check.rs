use bolt_cli::check_text;
use bolt_diagnostic::Source;
use criterion::{criterion_group, criterion_main, Criterion};

fn program(copies: usize) -> String {
    let mut out = String::from(
        "\
enum Maybe a.
  Just a
  Nothing
class Eq a.
  let eq : a -> a -> Bool
instance Eq Int.
  let eq a b = a == b
",
    );
    for ix in 0..copies {
        out.push_str(&format!(
            "\
let map{ix} f m = match m .
  Just x => Just (f x)
  Nothing => Nothing
let even{ix} n = if n == 0 . True else . odd{ix} (n - 1)
let odd{ix} n = if n == 0 . False else . even{ix} (n - 1)
let use{ix} = eq (n{ix} 1) (n{ix} 2)
let n{ix} x = x + {ix}
"
        ));
    }
    out
}

fn bench_check(c: &mut Criterion) {
    let source = Source::Interactive {
        label: String::from("bench"),
    };
    let small = program(1);
    let large = program(50);
    c.bench_function("check_small", |b| {
        b.iter(|| check_text(source.clone(), &small))
    });
    c.bench_function("check_large", |b| {
        b.iter(|| check_text(source.clone(), &large))
    });
}

criterion_group!(benches, bench_check);
criterion_main!(benches);
