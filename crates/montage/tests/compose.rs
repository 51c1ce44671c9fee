//! End-to-end composition scenarios against the in-memory tree.

use montage::{Dom, MemoryDom, View};

fn span(text: &str) -> View {
    let text = text.to_string();
    View::new("span").with_template(move |_| text.clone())
}

#[test]
fn append_and_prepend_share_an_anchor_in_position_order() {
    let mut dom = MemoryDom::new();
    let mut page = View::layout("div").with_template(|_| "<hr/>".to_string());
    page.add_view("append", span("A")).unwrap();
    page.add_view("prepend", span("B")).unwrap();

    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<span>B</span><hr/><span>A</span>"
    );
}

#[test]
fn re_render_is_idempotent() {
    let mut dom = MemoryDom::new();
    let mut page = View::layout("div").with_template(|_| "<hr/>".to_string());
    page.add_view("append", span("A")).unwrap();
    page.add_view("prepend", span("B")).unwrap();

    page.render(&mut dom);
    let first = dom.outer_markup(page.root().unwrap());
    page.render(&mut dom);
    page.render(&mut dom);
    assert_eq!(dom.outer_markup(page.root().unwrap()), first);
}

#[test]
fn outer_child_replaces_its_placeholder() {
    let mut dom = MemoryDom::new();
    let mut page =
        View::layout("div").with_template(|_| "<p class=\"slot\"/><hr/>".to_string());
    page.add_view("outer .slot", span("X")).unwrap();

    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<span>X</span><hr/>"
    );

    // The placeholder is recreated by the template and replaced again; the
    // child never replaces itself away.
    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<span>X</span><hr/>"
    );
}

#[test]
fn before_group_keeps_positional_order_after_removal() {
    let mut dom = MemoryDom::new();
    let mut page = View::layout("div").with_template(|_| "<main/>".to_string());
    page.add_view("before main", span("A")).unwrap();
    page.add_view("before main", span("B")).unwrap();
    page.add_view("before main", span("C")).unwrap();

    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<span>A</span><span>B</span><span>C</span><main/>"
    );

    // Removing the middle child repacks positions; the survivors keep their
    // relative order through the next render.
    let removed = page.remove_view_at(&mut dom, "before main", 1).unwrap();
    assert_eq!(page.find_views("before main").len(), 2);
    drop(removed);

    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<span>A</span><span>C</span><main/>"
    );
}

#[test]
fn groups_replay_in_first_use_order() {
    let mut dom = MemoryDom::new();
    let mut page =
        View::layout("div").with_template(|_| "<nav/><main/>".to_string());
    page.add_view("append main", span("1")).unwrap();
    page.add_view("inner nav", span("2")).unwrap();
    page.add_view("append main", span("3")).unwrap();

    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<nav><span>2</span></nav><main><span>1</span><span>3</span></main>"
    );
}

#[test]
fn nested_layouts_compose_recursively() {
    let mut dom = MemoryDom::new();
    let mut section =
        View::layout("section").with_template(|_| "<div class=\"body\"/>".to_string());
    section.add_view("append .body", span("deep")).unwrap();

    let mut page = View::layout("div");
    page.add_view("append", section).unwrap();

    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<section><div class=\"body\"><span>deep</span></div></section>"
    );
}

#[test]
fn added_child_appears_on_next_render_only() {
    let mut dom = MemoryDom::new();
    let mut page = View::layout("div");
    page.render(&mut dom);

    page.add_view("append", span("late")).unwrap();
    assert_eq!(dom.inner_markup(page.root().unwrap()), "");
    assert!(!page.is_rendered());

    page.render(&mut dom);
    assert_eq!(dom.inner_markup(page.root().unwrap()), "<span>late</span>");
}

fn two_column() -> View {
    let mut page =
        View::layout("div").with_template(|_| "<main class=\"content\"/>".to_string());
    page.add_view("append .content", span("first")).unwrap();
    page.add_view("append .content", span("second")).unwrap();
    page
}

#[test]
fn attach_adopts_markup_a_fresh_render_produced() {
    // Render once to get reference markup.
    let mut dom = MemoryDom::new();
    let mut fresh = two_column();
    fresh.render(&mut dom);
    let markup = dom.outer_markup(fresh.root().unwrap());

    // Recreate that markup in a second tree, as a server response would.
    let mut server_dom = MemoryDom::new();
    let body = server_dom.create_element("body", &[]);
    server_dom.set_inner_markup(body, &markup);
    let host = server_dom.select(body, "div").unwrap();

    let mut attached = two_column();
    attached.attach(&mut server_dom, host);

    // Every child adopted a live node.
    for view in attached.find_views("append .content") {
        assert!(view.root().is_some());
        assert!(view.is_rendered());
    }
    // Attaching did not disturb the markup.
    assert_eq!(server_dom.outer_markup(host), markup);

    // And a later render converges on the same markup.
    attached.render(&mut server_dom);
    assert_eq!(server_dom.outer_markup(host), markup);
}

#[test]
fn attach_leaves_unlocatable_children_for_the_next_render() {
    let mut dom = MemoryDom::new();
    let body = dom.create_element("body", &[]);
    dom.set_inner_markup(body, "<div><main class=\"content\"/></div>");
    let host = dom.select(body, "div").unwrap();

    // The server markup carries no items; attach finds nothing for them.
    let mut page = two_column();
    page.attach(&mut dom, host);
    for view in page.find_views("append .content") {
        assert!(view.root().is_none());
    }

    page.render(&mut dom);
    assert_eq!(
        dom.inner_markup(host),
        "<main class=\"content\"><span>first</span><span>second</span></main>"
    );
}

#[test]
fn remove_view_tears_the_child_out_of_the_tree() {
    let mut dom = MemoryDom::new();
    let mut page = View::layout("div");
    page.add_view("append", span("gone")).unwrap();
    page.render(&mut dom);

    let child_root = page.get_view("append").unwrap().root().unwrap();
    page.remove_view(&mut dom, "append").unwrap();

    assert!(!dom.contains(child_root));
    // The bookkeeping is empty, so re-render leaves the host bare.
    page.render(&mut dom);
    assert_eq!(dom.inner_markup(page.root().unwrap()), "");
}

#[test]
fn reset_views_replaces_the_whole_tree() {
    let mut dom = MemoryDom::new();
    let mut page = View::layout("div").with_template(|_| "<main/>".to_string());
    page.add_view("append main", span("old")).unwrap();
    page.render(&mut dom);

    page.reset_views(
        &mut dom,
        vec![
            ("prepend main".to_string(), span("new-1")),
            ("append main".to_string(), span("new-2")),
        ],
    )
    .unwrap();
    page.render(&mut dom);

    assert_eq!(
        dom.inner_markup(page.root().unwrap()),
        "<main><span>new-1</span><span>new-2</span></main>"
    );
}
