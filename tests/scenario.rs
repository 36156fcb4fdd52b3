use std::io::Cursor;

use ilpconv::{
    coeff,
    instances::{
        fio::{
            inc, open_compressed_uncompressed_read, InputStream, ReadInstance,
            UnrepresentableInstance, WriteError, WriteInstance,
        },
        Instance,
    },
    options::Options,
    pipeline::{Job, Registry, StageError, State, StreamSink},
    transforms::split::split_instance,
    types::{Domain, LinConstraint, Origin, Term},
    var,
};

fn scenario_path() -> String {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    format!("{manifest}/data/scenario.inc")
}

fn read_scenario() -> Instance {
    let mut input = open_compressed_uncompressed_read(scenario_path()).unwrap();
    inc::Reader::new(&Options::new())
        .unwrap()
        .decode_next(&mut input)
        .unwrap()
        .unwrap()
}

#[test]
fn split_constraints() {
    let mut inst = read_scenario();
    split_instance(&mut inst).unwrap();
    let a1 = inst.var_by_name("a1").unwrap();
    assert_eq!(a1, var![5]);
    assert_eq!(inst.domain(a1), Some(Domain::int(0, 3).unwrap()));
    assert_eq!(inst.var_info(a1).unwrap().origin, Origin::Auxiliary);
    assert_eq!(
        inst.constrs(),
        &[
            LinConstraint::new_eq(
                [Term::int(1, var![1]), Term::int(2, var![2]), Term::int(-1, a1)],
                coeff![0]
            ),
            LinConstraint::new_ub(
                [Term::int(1, a1), Term::int(3, var![3]), Term::int(4, var![4])],
                coeff![10]
            ),
        ]
    );
}

#[test]
fn no_split_is_unrepresentable() {
    let mut job = Job::new("inc", "aspartame");
    job.settings.no_split = true;
    let mut converter = Registry::default().converter(&job).unwrap();
    let mut input = open_compressed_uncompressed_read(scenario_path()).unwrap();
    let mut sink = StreamSink::new(Vec::new());
    let err = converter
        .run(&mut input, &scenario_path(), &mut sink)
        .unwrap_err();
    assert_eq!(err.label, "scenario");
    assert_eq!(err.stage, State::Writing);
    assert!(matches!(
        err.source,
        StageError::Write(WriteError::Unrepresentable(UnrepresentableInstance {
            format: "aspartame",
            ..
        }))
    ));
    assert!(sink.into_inner().is_empty());
}

#[test]
fn split_to_aspartame() {
    let mut converter = Registry::default()
        .converter(&Job::new("inc", "aspartame"))
        .unwrap();
    let mut input = open_compressed_uncompressed_read(scenario_path()).unwrap();
    let mut sink = StreamSink::new(Vec::new());
    let summary = converter
        .run(&mut input, &scenario_path(), &mut sink)
        .unwrap();
    assert_eq!(summary.n_written, 1);
    assert_eq!(summary.n_aux, 1);
    assert!(summary.exhausted);
    assert_eq!(
        String::from_utf8(sink.into_inner()).unwrap(),
        "% scenario
var(int,\"x1\",range(0,1)).
var(int,\"x2\",range(0,1)).
var(int,\"x3\",range(0,1)).
var(int,\"x4\",range(0,1)).
var(int,\"a1\",range(0,3)).
constraint(1,eq,0).
term(1,1,\"x1\").
term(1,2,\"x2\").
term(1,-1,\"a1\").
constraint(2,le,10).
term(2,1,\"a1\").
term(2,3,\"x3\").
term(2,4,\"x4\").
objective(maximize).
objterm(1,\"x1\").
objterm(1,\"x2\").
objterm(1,\"x3\").
objterm(1,\"x4\").
"
    );
}

#[test]
fn exchange_round_trip_keeps_auxiliaries() {
    let mut inst = read_scenario();
    split_instance(&mut inst).unwrap();
    let mut buf = Vec::new();
    inc::Writer::new(&Options::new())
        .unwrap()
        .encode(&inst, &mut buf)
        .unwrap();
    let back = inc::Reader::new(&Options::new())
        .unwrap()
        .decode_next(&mut InputStream::new(Cursor::new(buf)))
        .unwrap()
        .unwrap();
    assert_eq!(back.constrs(), inst.constrs());
    assert_eq!(back.objective(), inst.objective());
    assert_eq!(back.n_aux_vars(), 1);
    assert_eq!(back.name(), Some("scenario"));
    // splitting again does not change anything
    let mut again = back.clone();
    split_instance(&mut again).unwrap();
    assert_eq!(again.constrs(), back.constrs());
}
