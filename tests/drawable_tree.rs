use std::{cell::RefCell, rc::Rc};

use kurbo::Rect;
use phylotree::{
    ChangeType, CladeIndex, DrawableTree, DrawableTreeConfig, NewickStyle, Orientation,
    SelectionMode, Tree,
};

const PRIMATES: &str =
    "((Human:0.2[&tip=hs],Chimp:0.2):0.3,(Gorilla:0.4,(Orangutan:0.3,Gibbon:0.3):0.2):0.1);";

#[test]
fn select_and_extract_a_clade() {
    let config = DrawableTreeConfig {
        selection_mode: SelectionMode::Descendant,
        ..Default::default()
    };
    let mut tree = DrawableTree::from_newick(PRIMATES, config).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    tree.subscribe(move |change: ChangeType| sink.borrow_mut().push(change));

    let index = CladeIndex::from_tree(tree.tree());
    let great_apes = index.find(&["Gibbon", "Orangutan"]).unwrap();
    tree.ensure_layout();
    let at = tree.position(great_apes).unwrap();

    // Region around one internal node selects the tips below it
    assert!(tree.select_region(Some(Rect::from_center_size(at, (0.01, 0.01)))));
    assert_eq!(tree.selected_nodes().len(), 2);

    let extracted = tree.extract_selected_tree().unwrap();
    assert_eq!(extracted.tree().to_newick(), "(Orangutan:0.3,Gibbon:0.3);");

    tree.toggle_collapsed_selection();
    tree.set_orientation(Orientation::Left);
    assert_eq!(*seen.borrow(), vec![ChangeType::Collapsed, ChangeType::Orientation]);
}

#[test]
fn edits_round_trip_through_newick() {
    let mut tree = DrawableTree::from_newick(PRIMATES, DrawableTreeConfig::default()).unwrap();
    let index = CladeIndex::from_tree(tree.tree());
    let gorilla = index.find(&["Gorilla"]).unwrap();

    tree.remove_clade(gorilla).unwrap();
    let text = tree.tree().to_newick_with_style(NewickStyle::Annotated);
    assert_eq!(
        text,
        "((Human[&tip=hs]:0.2,Chimp:0.2):0.3,(Orangutan:0.3,Gibbon:0.3):0.30000000000000004);"
    );

    let reparsed = Tree::from_newick(&text).unwrap();
    assert_eq!(&reparsed, tree.tree());
    assert!(tree.restore_from_original_newick().unwrap());
    assert_eq!(tree.tree().num_leaves(), 5);
}
