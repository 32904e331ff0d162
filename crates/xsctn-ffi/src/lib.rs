//! C Foreign Function Interface (FFI) for the cross-section reader
//!
//! Exposes a parsed cross-section to C and C++ solvers through an opaque
//! handle. Functions returning `c_int` status use [`XSCTN_SUCCESS`] and
//! [`XSCTN_FAIL`]; the message of the last failure on the calling thread is
//! available from [`xsctn_last_error`].

use std::cell::RefCell;
use std::ffi::{c_char, c_double, c_int, CStr, CString};
use std::ptr;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xsctn_core::{
    Contour, CrossSection, ParseOptions, Primitive, ReplicaLayout, Shape, XsctnError,
};

pub const XSCTN_SUCCESS: c_int = 0;
pub const XSCTN_FAIL: c_int = -1;

/// Contour list selectors for the shape accessors
pub const XSCTN_SIGNALS: c_int = 0;
pub const XSCTN_GROUNDS: c_int = 1;

/// Primitive codes
pub const XSCTN_RECTANGLE: c_int = 0;
pub const XSCTN_CIRCLE: c_int = 1;
pub const XSCTN_POLYGON: c_int = 2;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: String) {
    let message = CString::new(message).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn fail(err: XsctnError) -> c_int {
    debug!(error = %err, "cross-section read failed");
    set_last_error(err.to_string());
    XSCTN_FAIL
}

// ============================================================================
// Opaque Types for C
// ============================================================================

/// Opaque handle to a parsed CrossSection
pub struct CCrossSection {
    inner: Box<CrossSection>,
    cached_signal_names: Vec<CString>,
    cached_units: CString,
}

impl CCrossSection {
    fn new(section: CrossSection) -> Self {
        let cached_signal_names = section
            .signals
            .iter()
            .map(|s| CString::new(s.name.clone()).unwrap_or_default())
            .collect();
        let cached_units = CString::new(section.units.name()).unwrap_or_default();
        Self {
            inner: Box::new(section),
            cached_signal_names,
            cached_units,
        }
    }

    fn contour(&self, list: c_int, index: c_int) -> Option<&Contour> {
        let contours = match list {
            XSCTN_SIGNALS => &self.inner.signals,
            XSCTN_GROUNDS => &self.inner.ground_wires,
            _ => return None,
        };
        usize::try_from(index).ok().and_then(|i| contours.get(i))
    }
}

// ============================================================================
// Handle Creation and Destruction
// ============================================================================

unsafe fn path_arg<'a>(path: *const c_char) -> Result<&'a str, c_int> {
    if path.is_null() {
        set_last_error("null path".to_string());
        return Err(XSCTN_FAIL);
    }
    CStr::from_ptr(path).to_str().map_err(|_| {
        set_last_error("path is not valid UTF-8".to_string());
        XSCTN_FAIL
    })
}

unsafe fn finish_read(
    result: xsctn_core::Result<CrossSection>,
    out: *mut *mut CCrossSection,
) -> c_int {
    match result {
        Ok(section) => {
            *out = Box::into_raw(Box::new(CCrossSection::new(section)));
            XSCTN_SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Read a cross-section file into `*out`.
///
/// On failure `*out` is set to null and the message is kept for
/// [`xsctn_last_error`].
#[no_mangle]
pub unsafe extern "C" fn xsctn_read(
    filename: *const c_char,
    out: *mut *mut CCrossSection,
) -> c_int {
    if out.is_null() {
        set_last_error("null output handle".to_string());
        return XSCTN_FAIL;
    }
    *out = ptr::null_mut();
    let filename = match path_arg(filename) {
        Ok(s) => s,
        Err(status) => return status,
    };
    finish_read(xsctn_core::read(filename), out)
}

/// Read `<basename>.xsctn` into `*out`.
#[no_mangle]
pub unsafe extern "C" fn xsctn_read_basename(
    basename: *const c_char,
    out: *mut *mut CCrossSection,
) -> c_int {
    if out.is_null() {
        set_last_error("null output handle".to_string());
        return XSCTN_FAIL;
    }
    *out = ptr::null_mut();
    let basename = match path_arg(basename) {
        Ok(s) => s,
        Err(status) => return status,
    };
    finish_read(xsctn_core::read_basename(basename), out)
}

/// Read a cross-section file with caller-seeded options into `*out`.
///
/// Positive `contour_segments` and `plane_segments` win over the file's
/// `CSEG` and `DSEG`; zero or negative keeps the file's values. A nonzero
/// `pitched` places `RectangleDielectric` replicas along their pitch.
#[no_mangle]
pub unsafe extern "C" fn xsctn_read_with_options(
    filename: *const c_char,
    contour_segments: c_int,
    plane_segments: c_int,
    pitched: c_int,
    out: *mut *mut CCrossSection,
) -> c_int {
    if out.is_null() {
        set_last_error("null output handle".to_string());
        return XSCTN_FAIL;
    }
    *out = ptr::null_mut();
    let filename = match path_arg(filename) {
        Ok(s) => s,
        Err(status) => return status,
    };

    let mut options = ParseOptions::new();
    if let Ok(count) = u32::try_from(contour_segments) {
        options = options.with_contour_segments(count);
    }
    if let Ok(count) = u32::try_from(plane_segments) {
        options = options.with_plane_segments(count);
    }
    if pitched != 0 {
        options = options.with_replica_layout(ReplicaLayout::Pitched);
    }
    finish_read(xsctn_core::read_with_options(filename, &options), out)
}

/// Free a cross-section handle.
#[no_mangle]
pub unsafe extern "C" fn xsctn_free(section: *mut CCrossSection) {
    if !section.is_null() {
        drop(Box::from_raw(section));
    }
}

/// Message of the last failure on this thread, or null.
///
/// The pointer stays valid until the next failing call on the same thread.
#[no_mangle]
pub extern "C" fn xsctn_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| match &*slot.borrow() {
        Some(message) => message.as_ptr(),
        None => ptr::null(),
    })
}

/// Install a stderr log subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Fails if a global subscriber is already set.
#[no_mangle]
pub extern "C" fn xsctn_init_logging() -> c_int {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => XSCTN_SUCCESS,
        Err(e) => {
            set_last_error(e.to_string());
            XSCTN_FAIL
        }
    }
}

// ============================================================================
// Scalar Accessors
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_contour_segments(section: *const CCrossSection) -> c_int {
    if section.is_null() {
        return XSCTN_FAIL;
    }
    (*section).inner.contour_segments as c_int
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_plane_segments(section: *const CCrossSection) -> c_int {
    if section.is_null() {
        return XSCTN_FAIL;
    }
    (*section).inner.plane_segments as c_int
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_ground_plane_count(section: *const CCrossSection) -> c_int {
    if section.is_null() {
        return XSCTN_FAIL;
    }
    (*section).inner.ground_planes as c_int
}

/// Coupling length in meters
#[no_mangle]
pub unsafe extern "C" fn xsctn_get_coupling_length(section: *const CCrossSection) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section).inner.coupling_length
}

/// Rise time in seconds
#[no_mangle]
pub unsafe extern "C" fn xsctn_get_rise_time(section: *const CCrossSection) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section).inner.rise_time
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_default_conductivity(section: *const CCrossSection) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section).inner.default_conductivity
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_half_minimum_dimension(
    section: *const CCrossSection,
) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section).inner.half_minimum_dimension
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_top_ground_plane_thickness(
    section: *const CCrossSection,
) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section).inner.top_ground_plane_thickness
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_bottom_ground_plane_thickness(
    section: *const CCrossSection,
) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section).inner.bottom_ground_plane_thickness
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_total_width(section: *const CCrossSection) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section).inner.total_width
}

/// Name of the file's default length unit
#[no_mangle]
pub unsafe extern "C" fn xsctn_get_units(section: *const CCrossSection) -> *const c_char {
    if section.is_null() {
        return ptr::null();
    }
    (*section).cached_units.as_ptr()
}

// ============================================================================
// Dielectric Accessors
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_dielectric_count(section: *const CCrossSection) -> c_int {
    if section.is_null() {
        return 0;
    }
    (*section).inner.dielectrics.len() as c_int
}

/// Copy one dielectric layer out.
///
/// `out_bounds` receives `x0, y0, x1, y1` and must hold 4 doubles.
#[no_mangle]
pub unsafe extern "C" fn xsctn_get_dielectric(
    section: *const CCrossSection,
    index: c_int,
    out_constant: *mut c_double,
    out_loss_tangent: *mut c_double,
    out_bounds: *mut c_double,
) -> c_int {
    if section.is_null() || out_constant.is_null() || out_bounds.is_null() || index < 0 {
        return XSCTN_FAIL;
    }
    let Some(layer) = (&(*section).inner.dielectrics).get(index as usize) else {
        return XSCTN_FAIL;
    };
    *out_constant = layer.constant;
    if !out_loss_tangent.is_null() {
        *out_loss_tangent = layer.loss_tangent;
    }
    let bounds = [layer.x0, layer.y0, layer.x1, layer.y1];
    ptr::copy_nonoverlapping(bounds.as_ptr(), out_bounds, bounds.len());
    XSCTN_SUCCESS
}

// ============================================================================
// Signal and Ground Accessors
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_signal_count(section: *const CCrossSection) -> c_int {
    if section.is_null() {
        return 0;
    }
    (*section).inner.num_signals() as c_int
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_ground_count(section: *const CCrossSection) -> c_int {
    if section.is_null() {
        return 0;
    }
    (*section).inner.num_grounds() as c_int
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_signal_name(
    section: *const CCrossSection,
    index: c_int,
) -> *const c_char {
    if section.is_null() || index < 0 {
        return ptr::null();
    }
    match (&(*section).cached_signal_names).get(index as usize) {
        Some(name) => name.as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_signal_conductivity(
    section: *const CCrossSection,
    index: c_int,
) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    (*section)
        .contour(XSCTN_SIGNALS, index)
        .map(|c| c.conductivity)
        .unwrap_or(0.0)
}

unsafe fn primitive_code(section: *const CCrossSection, list: c_int, index: c_int) -> c_int {
    if section.is_null() {
        return XSCTN_FAIL;
    }
    match (*section).contour(list, index).map(Contour::primitive) {
        Some(Primitive::Rectangle) => XSCTN_RECTANGLE,
        Some(Primitive::Circle) => XSCTN_CIRCLE,
        Some(Primitive::Polygon) => XSCTN_POLYGON,
        None => XSCTN_FAIL,
    }
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_signal_primitive(
    section: *const CCrossSection,
    index: c_int,
) -> c_int {
    primitive_code(section, XSCTN_SIGNALS, index)
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_ground_primitive(
    section: *const CCrossSection,
    index: c_int,
) -> c_int {
    primitive_code(section, XSCTN_GROUNDS, index)
}

unsafe fn rectangle(
    section: *const CCrossSection,
    list: c_int,
    index: c_int,
    out_bounds: *mut c_double,
) -> c_int {
    if section.is_null() || out_bounds.is_null() {
        return XSCTN_FAIL;
    }
    match (*section).contour(list, index).map(|c| &c.shape) {
        Some(&Shape::Rectangle { x0, y0, x1, y1 }) => {
            let bounds = [x0, y0, x1, y1];
            ptr::copy_nonoverlapping(bounds.as_ptr(), out_bounds, bounds.len());
            XSCTN_SUCCESS
        }
        _ => XSCTN_FAIL,
    }
}

unsafe fn circle(
    section: *const CCrossSection,
    list: c_int,
    index: c_int,
    out_cx: *mut c_double,
    out_cy: *mut c_double,
    out_radius: *mut c_double,
) -> c_int {
    if section.is_null() || out_cx.is_null() || out_cy.is_null() || out_radius.is_null() {
        return XSCTN_FAIL;
    }
    match (*section).contour(list, index).map(|c| &c.shape) {
        Some(&Shape::Circle { cx, cy, radius }) => {
            *out_cx = cx;
            *out_cy = cy;
            *out_radius = radius;
            XSCTN_SUCCESS
        }
        _ => XSCTN_FAIL,
    }
}

/// Copy a rectangular signal's `x0, y0, x1, y1` into `out_bounds`.
#[no_mangle]
pub unsafe extern "C" fn xsctn_get_signal_rectangle(
    section: *const CCrossSection,
    index: c_int,
    out_bounds: *mut c_double,
) -> c_int {
    rectangle(section, XSCTN_SIGNALS, index, out_bounds)
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_ground_rectangle(
    section: *const CCrossSection,
    index: c_int,
    out_bounds: *mut c_double,
) -> c_int {
    rectangle(section, XSCTN_GROUNDS, index, out_bounds)
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_signal_circle(
    section: *const CCrossSection,
    index: c_int,
    out_cx: *mut c_double,
    out_cy: *mut c_double,
    out_radius: *mut c_double,
) -> c_int {
    circle(section, XSCTN_SIGNALS, index, out_cx, out_cy, out_radius)
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_ground_circle(
    section: *const CCrossSection,
    index: c_int,
    out_cx: *mut c_double,
    out_cy: *mut c_double,
    out_radius: *mut c_double,
) -> c_int {
    circle(section, XSCTN_GROUNDS, index, out_cx, out_cy, out_radius)
}

// ============================================================================
// Polygon Accessors
// ============================================================================

/// Number of stored polygon vertices; the closing edge is implicit.
///
/// `list` is [`XSCTN_SIGNALS`] or [`XSCTN_GROUNDS`]. Returns
/// [`XSCTN_FAIL`] when the contour is not a polygon.
#[no_mangle]
pub unsafe extern "C" fn xsctn_get_polygon_point_count(
    section: *const CCrossSection,
    list: c_int,
    index: c_int,
) -> c_int {
    if section.is_null() {
        return XSCTN_FAIL;
    }
    match (*section).contour(list, index).map(|c| &c.shape) {
        Some(Shape::Polygon { points, .. }) => points.len() as c_int,
        _ => XSCTN_FAIL,
    }
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_polygon_point(
    section: *const CCrossSection,
    list: c_int,
    index: c_int,
    point: c_int,
    out_x: *mut c_double,
    out_y: *mut c_double,
) -> c_int {
    if section.is_null() || out_x.is_null() || out_y.is_null() || point < 0 {
        return XSCTN_FAIL;
    }
    match (*section).contour(list, index).map(|c| &c.shape) {
        Some(Shape::Polygon { points, .. }) => match points.get(point as usize) {
            Some(p) => {
                *out_x = p.x;
                *out_y = p.y;
                XSCTN_SUCCESS
            }
            None => XSCTN_FAIL,
        },
        _ => XSCTN_FAIL,
    }
}

#[no_mangle]
pub unsafe extern "C" fn xsctn_get_polygon_perimeter(
    section: *const CCrossSection,
    list: c_int,
    index: c_int,
) -> c_double {
    if section.is_null() {
        return 0.0;
    }
    match (*section).contour(list, index).map(|c| &c.shape) {
        Some(&Shape::Polygon { perimeter, .. }) => perimeter,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "set CSEG 8\n\
                          set DSEG 12\n\
                          GroundPlane G1\n\
                          DielectricLayer D1 -thickness 10 -permittivity 4.2 -lossTangent 0.01\n\
                          RectangleConductors sig -width 5 -height 1\n\
                          TrapezoidConductors tr -topWidth 2 -bottomWidth 4 -height 1 -xOffset 20\n\
                          CircleConductors ground -diameter 2 -xOffset 40\n";

    fn write_sample(text: &str) -> (tempfile::TempDir, CString) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.xsctn");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(text.as_bytes())
            .unwrap();
        let c_path = CString::new(path.to_str().unwrap()).unwrap();
        (dir, c_path)
    }

    fn open(text: &str) -> (tempfile::TempDir, *mut CCrossSection) {
        let (dir, c_path) = write_sample(text);
        let mut handle = ptr::null_mut();
        let status = unsafe { xsctn_read(c_path.as_ptr(), &mut handle) };
        assert_eq!(status, XSCTN_SUCCESS);
        assert!(!handle.is_null());
        (dir, handle)
    }

    #[test]
    fn test_read_and_scalars() {
        let (_dir, handle) = open(SAMPLE);
        unsafe {
            assert_eq!(xsctn_get_contour_segments(handle), 8);
            assert_eq!(xsctn_get_plane_segments(handle), 12);
            assert_eq!(xsctn_get_ground_plane_count(handle), 1);
            assert_eq!(xsctn_get_signal_count(handle), 2);
            assert_eq!(xsctn_get_ground_count(handle), 1);
            assert_eq!(xsctn_get_dielectric_count(handle), 1);
            assert!(xsctn_get_half_minimum_dimension(handle) > 0.0);
            let units = CStr::from_ptr(xsctn_get_units(handle));
            assert_eq!(units.to_str().unwrap(), "mils");
            xsctn_free(handle);
        }
    }

    #[test]
    fn test_dielectric_and_shapes() {
        let (_dir, handle) = open(SAMPLE);
        unsafe {
            let mut constant = 0.0;
            let mut loss = 0.0;
            let mut bounds = [0.0f64; 4];
            let status =
                xsctn_get_dielectric(handle, 0, &mut constant, &mut loss, bounds.as_mut_ptr());
            assert_eq!(status, XSCTN_SUCCESS);
            assert_eq!(constant, 4.2);
            assert_eq!(loss, 0.01);
            assert_eq!(bounds[1], 0.0);

            let name = CStr::from_ptr(xsctn_get_signal_name(handle, 0));
            assert_eq!(name.to_str().unwrap(), "sigR0");
            assert_eq!(xsctn_get_signal_primitive(handle, 0), XSCTN_RECTANGLE);
            assert_eq!(
                xsctn_get_signal_rectangle(handle, 0, bounds.as_mut_ptr()),
                XSCTN_SUCCESS
            );
            assert!(bounds[2] > bounds[0]);

            assert_eq!(xsctn_get_signal_primitive(handle, 1), XSCTN_POLYGON);
            assert_eq!(xsctn_get_polygon_point_count(handle, XSCTN_SIGNALS, 1), 4);
            let (mut x, mut y) = (0.0, 0.0);
            assert_eq!(
                xsctn_get_polygon_point(handle, XSCTN_SIGNALS, 1, 3, &mut x, &mut y),
                XSCTN_SUCCESS
            );
            assert_eq!(
                xsctn_get_polygon_point(handle, XSCTN_SIGNALS, 1, 4, &mut x, &mut y),
                XSCTN_FAIL
            );
            assert!(xsctn_get_polygon_perimeter(handle, XSCTN_SIGNALS, 1) > 0.0);

            assert_eq!(xsctn_get_ground_primitive(handle, 0), XSCTN_CIRCLE);
            let (mut cx, mut cy, mut r) = (0.0, 0.0, 0.0);
            assert_eq!(
                xsctn_get_ground_circle(handle, 0, &mut cx, &mut cy, &mut r),
                XSCTN_SUCCESS
            );
            assert!(r > 0.0);
            assert_eq!(
                xsctn_get_ground_rectangle(handle, 0, bounds.as_mut_ptr()),
                XSCTN_FAIL
            );
            assert_eq!(xsctn_get_signal_primitive(handle, 5), XSCTN_FAIL);
            xsctn_free(handle);
        }
    }

    #[test]
    fn test_read_with_options() {
        let (_dir, c_path) = write_sample(
            "set CSEG 8\n\
             set DSEG 12\n\
             GroundPlane G1\n\
             RectangleDielectric rib -width 2 -height 1 -number 2 -pitch 5\n",
        );
        let mut handle = ptr::null_mut();
        unsafe {
            let status = xsctn_read_with_options(c_path.as_ptr(), 3, 0, 1, &mut handle);
            assert_eq!(status, XSCTN_SUCCESS);
            assert_eq!(xsctn_get_contour_segments(handle), 3);
            assert_eq!(xsctn_get_plane_segments(handle), 12);

            let mut constant = 0.0;
            let mut bounds = [0.0f64; 4];
            let status = xsctn_get_dielectric(
                handle,
                1,
                &mut constant,
                ptr::null_mut(),
                bounds.as_mut_ptr(),
            );
            assert_eq!(status, XSCTN_SUCCESS);
            assert!((bounds[0] - 5.0 * xsctn_core::METERS_PER_MIL).abs() < 1e-15);
            xsctn_free(handle);

            assert_eq!(
                xsctn_read_with_options(c_path.as_ptr(), -1, -1, 0, &mut handle),
                XSCTN_SUCCESS
            );
            assert_eq!(xsctn_get_contour_segments(handle), 8);
            let status = xsctn_get_dielectric(
                handle,
                1,
                &mut constant,
                ptr::null_mut(),
                bounds.as_mut_ptr(),
            );
            assert_eq!(status, XSCTN_SUCCESS);
            assert_eq!(bounds[0], 0.0);
            xsctn_free(handle);
        }
    }

    #[test]
    fn test_failure_sets_last_error() {
        let path = CString::new("/nonexistent/dir/line.xsctn").unwrap();
        let mut handle = ptr::null_mut();
        unsafe {
            assert_eq!(xsctn_read(path.as_ptr(), &mut handle), XSCTN_FAIL);
            assert!(handle.is_null());
            let message = CStr::from_ptr(xsctn_last_error());
            assert!(message.to_str().unwrap().contains("cannot open"));
        }
    }

    #[test]
    fn test_null_arguments() {
        let mut handle = ptr::null_mut();
        unsafe {
            assert_eq!(xsctn_read(ptr::null(), &mut handle), XSCTN_FAIL);
            assert_eq!(xsctn_get_signal_count(ptr::null()), 0);
            assert!(xsctn_get_signal_name(ptr::null(), 0).is_null());
            assert_eq!(xsctn_get_rise_time(ptr::null()), 0.0);
            xsctn_free(ptr::null_mut());
        }
    }
}
