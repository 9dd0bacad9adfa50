use kira_ppa::spatial::{Point, PointPattern, Window};

fn triangle() -> Window {
    Window::Polygon {
        vertices: vec![[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]],
    }
}

#[test]
fn rect_area_and_bounds() {
    let w = Window::rect(-1.0, 3.0, 2.0, 4.0);
    assert!((w.area() - 8.0).abs() < 1e-12);
    let b = w.bounds();
    assert_eq!(b.width(), 4.0);
    assert_eq!(b.height(), 2.0);
    assert_eq!(w.shortest_side(), 2.0);
}

#[test]
fn polygon_area_ignores_orientation() {
    let ccw = triangle();
    let cw = Window::Polygon {
        vertices: vec![[0.0, 0.0], [0.0, 4.0], [4.0, 0.0]],
    };
    assert!((ccw.area() - 8.0).abs() < 1e-12);
    assert!((cw.area() - 8.0).abs() < 1e-12);
}

#[test]
fn rect_contains_boundary() {
    let w = Window::rect(0.0, 1.0, 0.0, 1.0);
    assert!(w.contains(0.0, 0.0));
    assert!(w.contains(1.0, 0.5));
    assert!(w.contains(0.5, 0.5));
    assert!(!w.contains(1.0001, 0.5));
    assert!(!w.contains(0.5, -0.1));
}

#[test]
fn triangle_contains() {
    let w = triangle();
    assert!(w.contains(1.0, 1.0));
    assert!(w.contains(2.0, 2.0));
    assert!(w.contains(0.0, 2.0));
    assert!(!w.contains(3.0, 3.0));
    assert!(!w.contains(-0.5, 1.0));
}

#[test]
fn degenerate_windows_detected() {
    assert!(Window::rect(0.0, 0.0, 0.0, 1.0).is_degenerate());
    assert!(Window::rect(0.0, 1.0, 1.0, 0.0).is_degenerate());
    assert!(Window::rect(0.0, f64::NAN, 0.0, 1.0).is_degenerate());
    let collinear = Window::Polygon {
        vertices: vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]],
    };
    assert!(collinear.is_degenerate());
    let two = Window::Polygon {
        vertices: vec![[0.0, 0.0], [1.0, 1.0]],
    };
    assert!(two.is_degenerate());
    assert!(!two.contains(0.5, 0.5));
    assert!(!triangle().is_degenerate());
}

#[test]
fn pattern_rejects_points_outside_window() {
    let w = Window::rect(0.0, 1.0, 0.0, 1.0);
    let err = PointPattern::new(w.clone(), vec![Point { x: 2.0, y: 0.5 }]).unwrap_err();
    assert!(err.to_string().contains("outside"));
    assert!(PointPattern::new(w.clone(), vec![Point { x: f64::NAN, y: 0.5 }]).is_err());
    assert!(PointPattern::new(Window::rect(0.0, 0.0, 0.0, 1.0), vec![]).is_err());

    let ok = PointPattern::new(w, vec![Point { x: 0.2, y: 0.3 }])
        .unwrap()
        .with_label("tumor");
    assert_eq!(ok.len(), 1);
    assert_eq!(ok.label(), Some("tumor"));
}

#[test]
fn window_serde_is_tagged() {
    let w = Window::rect(0.0, 2.0, 0.0, 3.0);
    let json = serde_json::to_value(&w).unwrap();
    assert_eq!(json["type"], "rect");
    let back: Window = serde_json::from_value(json).unwrap();
    assert_eq!(back, w);

    let poly: Window =
        serde_json::from_str(r#"{"type":"polygon","vertices":[[0,0],[1,0],[0,1]]}"#).unwrap();
    assert!((poly.area() - 0.5).abs() < 1e-12);
}
