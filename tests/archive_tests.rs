//! Integration tests for file-backed archives: modes, round-trips, user types.

use objarchive::archive::{
    register, take_component, Archive, ArchiveAccess, ArchiveGroup, ArchiveInert, ArchiveOptions, FromArchive,
    FromMapping, LeafAction, Mapping, OpenMode, Persist, ReadSelf, Reducible, SchemeEntry, SelfWriter, Value,
};
use objarchive::core::{Array, Key, KeyMode};
use objarchive::{Error, PlainOldDataType, Result};

use num_complex::{Complex32, Complex64};

use tempfile::TempDir;

fn archive_path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn test_roundtrip_scalar_and_matrix() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = archive_path(&dir, "basic.oga");

    {
        let ar = Archive::open(&path, "w").expect("Failed to create archive");
        ar.set("answer", 42i64).unwrap();
        ar.set("ident", Array::identity(3)).unwrap();
        ar.set("name", "run-1").unwrap();
        ar.close().unwrap();
    }

    let ar = Archive::open(&path, "r").expect("Failed to open archive");
    assert_eq!(ar.get("answer").unwrap().as_i64(), Some(42));
    assert_eq!(ar.get("name").unwrap().as_str(), Some("run-1"));

    let ident = ar.get("ident").unwrap();
    let ident = ident.as_array().expect("identity should read back as an array");
    assert_eq!(ident.dims().sizes(), &[3, 3]);
    assert_eq!(ident, &Array::identity(3));
}

#[test]
fn test_roundtrip_lists() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "lists.oga");

    let long: Vec<i64> = (0..12).map(|i| i * i).collect();
    {
        let ar = Archive::open(&path, "w").unwrap();
        ar.set("short", vec![1i64, 2, 3]).unwrap();
        ar.set("long", long.clone()).unwrap();
    }

    let ar = Archive::open(&path, "r").unwrap();
    assert_eq!(ar.get("short").unwrap(), Value::from(vec![1i64, 2, 3]));
    assert_eq!(ar.get("long").unwrap(), Value::from(long));
}

#[test]
fn test_roundtrip_complex() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "complex.oga");

    let gf: Vec<Complex64> = (0..6).map(|n| Complex64::new(n as f64, -0.5 * n as f64)).collect();
    {
        let ar = Archive::open(&path, "w").unwrap();
        ar.set("z", Complex64::new(1.5, -2.0)).unwrap();
        ar.set("z32", Complex32::new(0.25, 4.0)).unwrap();
        ar.set("gf", Array::new((2usize, 3usize), gf.clone()).unwrap()).unwrap();
        ar.close().unwrap();
    }

    let ar = Archive::open(&path, "r").unwrap();
    assert_eq!(ar.get("z").unwrap().as_complex(), Some(Complex64::new(1.5, -2.0)));
    assert_eq!(ar.get("z32").unwrap(), Value::from(Complex32::new(0.25, 4.0)));

    let back = ar.get("gf").unwrap();
    let back = back.as_array().expect("complex matrix should read back as an array");
    assert_eq!(back.pod(), PlainOldDataType::Complex64);
    assert_eq!(back.dims().sizes(), &[2, 3]);
    assert_eq!(back.to_vec::<Complex64>().unwrap(), gf);
}

#[test]
fn test_column_major_array_stored_row_major() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "layout.oga");

    // [[1, 2, 3], [4, 5, 6]] laid out column by column
    let a = Array::from_column_major((2usize, 3usize), vec![1.0f64, 4.0, 2.0, 5.0, 3.0, 6.0]).unwrap();
    {
        let ar = Archive::open(&path, "w").unwrap();
        ar.set("m", a).unwrap();
    }
    let ar = Archive::open(&path, "r").unwrap();
    let back = ar.get("m").unwrap();
    let back = back.as_array().unwrap();
    assert_eq!(back.to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_read_only_rejects_writes() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "ro.oga");
    Archive::open(&path, "w").unwrap().set("x", 1i64).unwrap();

    let ar = Archive::open(&path, "r").unwrap();
    assert!(matches!(ar.set("y", 2i64), Err(Error::ReadOnly)));
    assert!(matches!(ar.delete("x"), Err(Error::ReadOnly)));
    assert_eq!(ar.keys().unwrap(), vec![Key::from("x")]);
}

#[test]
fn test_missing_file_read() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "missing.oga");
    assert!(matches!(Archive::open(&path, "r"), Err(Error::FileNotFound(_))));
}

#[test]
fn test_append_and_write_modes() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "modes.oga");

    // append creates a missing file
    Archive::open(&path, "a").unwrap().set("first", 1i64).unwrap();
    Archive::open(&path, "a").unwrap().set("second", 2i64).unwrap();
    {
        let ar = Archive::open(&path, "r").unwrap();
        assert_eq!(ar.keys().unwrap(), vec![Key::from("first"), Key::from("second")]);
    }

    // write starts over
    Archive::open(&path, "w").unwrap().set("only", 3i64).unwrap();
    let ar = Archive::open(&path, "r").unwrap();
    assert_eq!(ar.keys().unwrap(), vec![Key::from("only")]);
}

#[test]
fn test_invalid_mode() {
    assert!(matches!(Archive::open("whatever.oga", "rw"), Err(Error::InvalidMode(_))));
}

#[test]
fn test_remote_file_url_is_read_only() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "remote.oga");
    Archive::open(&path, "w").unwrap().set("v", 7i64).unwrap();

    let url = format!("file://{}", path);
    assert!(matches!(Archive::open(&url, "a"), Err(Error::RemoteNotReadOnly(_))));
    assert!(matches!(Archive::open(&url, "w"), Err(Error::RemoteNotReadOnly(_))));

    let ar = Archive::open(&url, "r").unwrap();
    assert_eq!(ar.get("v").unwrap().as_i64(), Some(7));
    let local = ar.local_path().unwrap();
    assert!(local.exists());
    assert_ne!(local.to_string_lossy(), path);

    drop(ar);
    assert!(!local.exists(), "transient copy should be removed on close");
}

#[test]
fn test_general_keys_persist() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "keys.oga");
    let opts = || ArchiveOptions::new().key_mode(KeyMode::General);

    {
        let ar = Archive::open_with(&path, OpenMode::Write, opts()).unwrap();
        ar.set(1i64, "one").unwrap();
        ar.set((2i64, "b"), 2.5f64).unwrap();
        ar.set(true, "yes").unwrap();
    }

    let ar = Archive::open_with(&path, OpenMode::Read, opts()).unwrap();
    assert_eq!(ar.get(1i64).unwrap().as_str(), Some("one"));
    assert_eq!(ar.get((2i64, "b")).unwrap().as_f64(), Some(2.5));
    assert_eq!(ar.get(true).unwrap().as_str(), Some("yes"));
    assert!(ar.contains(Key::from(1i64)).unwrap());
}

#[test]
fn test_open_init() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "init.oga");
    let ar = Archive::open_init(
        &path,
        OpenMode::Write,
        ArchiveOptions::default(),
        [("alpha", 1.0f64), ("beta", 2.0f64)],
    )
    .unwrap();
    assert_eq!(ar.len().unwrap(), 2);
}

#[test]
fn test_apply_on_leaves_persisted() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "leaves.oga");
    {
        let ar = Archive::open(&path, "w").unwrap();
        ar.set("a", 1i64).unwrap();
        ar.set("b", 2i64).unwrap();
        ar.set("c", 3i64).unwrap();
        ar.apply_on_leaves(|key, _| {
            Ok(if key == &Key::from("b") { LeafAction::Delete } else { LeafAction::Keep })
        })
        .unwrap();
    }
    let ar = Archive::open(&path, "r").unwrap();
    assert_eq!(ar.keys().unwrap(), vec![Key::from("a"), Key::from("c")]);
}

#[test]
fn test_deep_copy_between_files() {
    let dir = TempDir::new().unwrap();
    let src_path = archive_path(&dir, "src.oga");
    let dst_path = archive_path(&dir, "dst.oga");

    let src = Archive::open(&src_path, "w").unwrap();
    let params = src.create_group("params").unwrap();
    params.set("beta", 10.0f64).unwrap();
    params.set("sizes", vec![4i64, 8]).unwrap();

    {
        let dst = Archive::open(&dst_path, "w").unwrap();
        dst.set("params", &params).unwrap();
    }
    params.set("beta", 20.0f64).unwrap();

    let dst = Archive::open(&dst_path, "r").unwrap();
    let copied = dst.group("params").unwrap();
    assert_eq!(copied.get("beta").unwrap().as_f64(), Some(10.0));
    assert_eq!(copied.get("sizes").unwrap(), Value::from(vec![4i64, 8]));
}

#[test]
fn test_closed_views_fail() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "closed.oga");
    let ar = Archive::open(&path, "w").unwrap();
    let sub = ar.create_group("sub").unwrap();
    ar.close().unwrap();
    assert!(matches!(sub.set("x", 1i64), Err(Error::Closed)));
    assert!(matches!(sub.keys(), Err(Error::Closed)));
}

#[test]
fn test_inert_stand_in() {
    fn record<A: ArchiveAccess>(target: &A, step: i64) -> Result<()> {
        target.write(format!("step_{}", step), step)
    }

    let inert = ArchiveInert::new();
    record(&inert, 1).unwrap();
    assert_eq!(inert.get("x").get("y"), ArchiveInert);

    let ar = Archive::in_memory(ArchiveOptions::default());
    record(&ar, 1).unwrap();
    assert_eq!(ar.get("step_1").unwrap().as_i64(), Some(1));
}

// -- user types ------------------------------------------------------------

/// Writes itself: a histogram with its bin edges and counts.
#[derive(Clone, Debug, PartialEq, Default)]
struct Histogram {
    edges: Vec<f64>,
    counts: Vec<u64>,
}

impl Persist for Histogram {
    fn as_self_writer(&self) -> Option<&dyn SelfWriter> {
        Some(self)
    }
}

impl SelfWriter for Histogram {
    fn write_self(&self, group: &ArchiveGroup) -> Result<()> {
        group.set("edges", Array::from_vec(self.edges.clone()))?;
        group.set("counts", Array::from_vec(self.counts.clone()))
    }
}

impl ReadSelf for Histogram {
    fn read_self(&mut self, group: &ArchiveGroup) -> Result<()> {
        let edges = group.get("edges")?;
        let counts = group.get("counts")?;
        self.edges = edges.as_array().ok_or_else(|| Error::mismatch("array", edges.kind()))?.to_vec()?;
        self.counts = counts.as_array().ok_or_else(|| Error::mismatch("array", counts.kind()))?.to_vec()?;
        Ok(())
    }
}

/// Reduces to components and rebuilds from them.
#[derive(Clone, Debug, PartialEq)]
struct Mesh {
    name: String,
    size: i64,
}

impl Persist for Mesh {
    fn as_reducible(&self) -> Option<&dyn Reducible> {
        Some(self)
    }
}

impl Reducible for Mesh {
    fn reduce_to_mapping(&self) -> Result<Mapping> {
        let mut m = Mapping::new();
        m.insert(Key::from("name"), Value::from(self.name.as_str()));
        m.insert(Key::from("size"), Value::from(self.size));
        Ok(m)
    }
}

impl FromMapping for Mesh {
    fn reconstruct_from_mapping(mut m: Mapping) -> Result<Self> {
        let name = take_component(&mut m, "name")?;
        let size = take_component(&mut m, "size")?;
        Ok(Mesh {
            name: name.as_str().ok_or_else(|| Error::mismatch("str", name.kind()))?.to_string(),
            size: size.as_i64().ok_or_else(|| Error::mismatch("int", size.kind()))?,
        })
    }
}

/// Reduces like [`Mesh`] but is rebuilt straight from its group.
#[derive(Clone, Debug, PartialEq)]
struct Span {
    lo: f64,
    hi: f64,
}

impl Persist for Span {
    fn as_reducible(&self) -> Option<&dyn Reducible> {
        Some(self)
    }
}

impl Reducible for Span {
    fn reduce_to_mapping(&self) -> Result<Mapping> {
        let mut m = Mapping::new();
        m.insert(Key::from("lo"), Value::from(self.lo));
        m.insert(Key::from("hi"), Value::from(self.hi));
        Ok(m)
    }
}

impl FromArchive for Span {
    fn construct_from_archive(group: &ArchiveGroup) -> Result<Self> {
        let read = |k: &str| -> Result<f64> {
            let v = group.get(k)?;
            v.as_f64().ok_or_else(|| Error::mismatch("f64", v.kind()))
        };
        Ok(Span { lo: read("lo")?, hi: read("hi")? })
    }
}

fn register_user_types() {
    register(SchemeEntry::of::<Histogram>().with_read_self::<Histogram>()).unwrap();
    register(SchemeEntry::of::<Mesh>().with_mapping_factory::<Mesh>()).unwrap();
    register(SchemeEntry::of::<Span>().with_archive_factory::<Span>()).unwrap();
}

#[test]
fn test_user_types_roundtrip() {
    register_user_types();
    let dir = TempDir::new().unwrap();
    let path = archive_path(&dir, "objects.oga");

    let hist = Histogram { edges: vec![0.0, 0.5, 1.0], counts: vec![3, 9] };
    let mesh = Mesh { name: "grid".into(), size: 64 };
    let span = Span { lo: -1.0, hi: 1.0 };

    {
        let ar = Archive::open(&path, "w").unwrap();
        ar.set("hist", Value::object(hist.clone())).unwrap();
        ar.set("mesh", Value::object(mesh.clone())).unwrap();
        ar.set("span", Value::object(span.clone())).unwrap();
        ar.set("all", vec![Value::object(mesh.clone()), Value::from(5i64)]).unwrap();
    }

    let ar = Archive::open(&path, "r").unwrap();
    assert_eq!(ar.get("hist").unwrap().downcast::<Histogram>(), Some(hist));
    assert_eq!(ar.get("mesh").unwrap().downcast::<Mesh>(), Some(mesh.clone()));
    assert_eq!(ar.get("span").unwrap().downcast::<Span>(), Some(span));

    let all = ar.get("all").unwrap();
    let all = all.as_slice().unwrap();
    assert_eq!(all[0].downcast_ref::<Mesh>(), Some(&mesh));
    assert_eq!(all[1].as_i64(), Some(5));

    let text = ar.to_string();
    assert!(text.contains("mesh : object Mesh"));
    assert!(text.contains("hist : object Histogram"));
}

#[test]
fn test_reconstruct_disabled() {
    register_user_types();
    let ar = Archive::in_memory(ArchiveOptions::new().reconstruct(false));
    ar.set("mesh", Value::object(Mesh { name: "m".into(), size: 1 })).unwrap();

    let raw = ar.get("mesh").unwrap();
    let group = raw.as_group().expect("reconstruction is off");
    assert_eq!(group.get("size").unwrap().as_i64(), Some(1));
    assert!(ar.get_with("mesh", true).unwrap().downcast_ref::<Mesh>().is_some());
}
